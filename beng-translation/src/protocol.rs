use beng_core::error::{BengError, TranslationKind};

/// The wire opcode table (§6). Unlisted opcodes decode to
/// [`Command::Unknown`] and are skipped rather than rejected, so a future
/// translation server can add fields this client doesn't understand yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Begin,
    End,
    Host,
    Uri,
    Status,
    Path,
    ContentType,
    Proxy,
    Ajp,
    Cgi,
    FastCgi,
    Was,
    Pipe,
    Redirect,
    Bounce,
    Filter,
    Process,
    ProcessCss,
    ProcessText,
    Session,
    Realm,
    MaxAge,
    Vary,
    Check,
    Previous,
    Invalidate,
    Regex,
    InverseRegex,
    Base,
    ExpandPath,
    ExpandPathInfo,
    View,
    SecureView,
    RemoteHost,
    UserAgent,
    QueryString,
    WidgetType,
    /// `{header_group: u8}{forward_mode: u8}` — overrides one group's entry
    /// in the response's [`beng_core::translation::HeaderForwardingPolicy`]
    /// (§4.7 step 6).
    HeaderForward,
    Unknown(u16),
}

impl Command {
    pub fn code(self) -> u16 {
        match self {
            Command::Begin => 1,
            Command::End => 2,
            Command::Host => 3,
            Command::Uri => 4,
            Command::Status => 5,
            Command::Path => 6,
            Command::ContentType => 7,
            Command::Proxy => 8,
            Command::Redirect => 9,
            Command::Filter => 10,
            Command::Process => 11,
            Command::Session => 12,
            Command::Cgi => 19,
            Command::WidgetType => 21,
            Command::RemoteHost => 16,
            Command::Ajp => 30,
            Command::FastCgi => 33,
            Command::View => 34,
            Command::UserAgent => 35,
            Command::MaxAge => 36,
            Command::Vary => 37,
            Command::QueryString => 38,
            Command::Pipe => 39,
            Command::Base => 40,
            Command::Invalidate => 42,
            Command::Bounce => 54,
            Command::Check => 64,
            Command::Previous => 65,
            Command::Was => 66,
            Command::Realm => 68,
            Command::ProcessCss => 74,
            Command::Regex => 79,
            Command::InverseRegex => 80,
            Command::ProcessText => 81,
            Command::ExpandPathInfo => 83,
            Command::ExpandPath => 84,
            Command::SecureView => 89,
            Command::HeaderForward => 90,
            Command::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Command::Begin,
            2 => Command::End,
            3 => Command::Host,
            4 => Command::Uri,
            5 => Command::Status,
            6 => Command::Path,
            7 => Command::ContentType,
            8 => Command::Proxy,
            9 => Command::Redirect,
            10 => Command::Filter,
            11 => Command::Process,
            12 => Command::Session,
            16 => Command::RemoteHost,
            19 => Command::Cgi,
            21 => Command::WidgetType,
            30 => Command::Ajp,
            33 => Command::FastCgi,
            34 => Command::View,
            35 => Command::UserAgent,
            36 => Command::MaxAge,
            37 => Command::Vary,
            38 => Command::QueryString,
            39 => Command::Pipe,
            40 => Command::Base,
            42 => Command::Invalidate,
            54 => Command::Bounce,
            64 => Command::Check,
            65 => Command::Previous,
            66 => Command::Was,
            68 => Command::Realm,
            74 => Command::ProcessCss,
            79 => Command::Regex,
            80 => Command::InverseRegex,
            81 => Command::ProcessText,
            83 => Command::ExpandPathInfo,
            84 => Command::ExpandPath,
            89 => Command::SecureView,
            90 => Command::HeaderForward,
            other => Command::Unknown(other),
        }
    }
}

/// One decoded wire packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub command: Command,
    pub payload: Vec<u8>,
}

/// `{length:u16 LE}{command:u16 LE}{payload}`, the whole packet zero-padded
/// up to the next 4-byte boundary (§6).
pub fn encode(command: Command, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&command.code().to_le_bytes());
    out.extend_from_slice(payload);
    let padded = (out.len() + 3) & !3;
    out.resize(padded, 0);
    out
}

pub fn encode_str(command: Command, s: &str) -> Vec<u8> {
    encode(command, s.as_bytes())
}

pub fn encode_empty(command: Command) -> Vec<u8> {
    encode(command, &[])
}

/// Decodes a single packet out of the front of `buf`. Returns `Ok(None)`
/// when more bytes are needed.
pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>, BengError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let length = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    let code = u16::from_le_bytes([buf[2], buf[3]]);
    let unpadded = 4 + length;
    let padded = (unpadded + 3) & !3;
    if buf.len() < padded {
        return Ok(None);
    }
    let payload = buf[4..unpadded].to_vec();
    Ok(Some((
        Packet {
            command: Command::from_code(code),
            payload,
        },
        padded,
    )))
}

pub fn payload_as_str(payload: &[u8]) -> Result<&str, BengError> {
    std::str::from_utf8(payload).map_err(|_| TranslationKind::Protocol("non-UTF-8 payload".into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_string_payload() {
        let wire = encode_str(Command::Uri, "/foo");
        let (packet, consumed) = decode(&wire).unwrap().unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(packet.command, Command::Uri);
        assert_eq!(payload_as_str(&packet.payload).unwrap(), "/foo");
    }

    #[test]
    fn packets_are_padded_to_a_4_byte_boundary() {
        let wire = encode_str(Command::Uri, "/x"); // 4-byte header + 2-byte payload = 6, padded to 8
        assert_eq!(wire.len(), 8);
    }

    #[test]
    fn partial_input_asks_for_more_bytes() {
        let wire = encode_str(Command::Uri, "/foo");
        assert!(decode(&wire[..3]).unwrap().is_none());
    }

    #[test]
    fn empty_packet_round_trips() {
        let wire = encode_empty(Command::Begin);
        let (packet, consumed) = decode(&wire).unwrap().unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(packet.command, Command::Begin);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn unknown_opcodes_round_trip_without_failing() {
        let wire = encode(Command::Unknown(9999), b"x");
        let (packet, _) = decode(&wire).unwrap().unwrap();
        assert_eq!(packet.command, Command::Unknown(9999));
    }

    #[test]
    fn known_codes_match_the_wire_table() {
        assert_eq!(Command::Begin.code(), 1);
        assert_eq!(Command::Was.code(), 66);
        assert_eq!(Command::ExpandPathInfo.code(), 83);
        assert_eq!(Command::SecureView.code(), 89);
    }
}
