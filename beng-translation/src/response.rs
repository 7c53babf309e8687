use crate::protocol::{decode, payload_as_str, Command};
use beng_core::address::{AddressKind, ResourceAddress};
use beng_core::error::BengError;
use beng_core::transformation::{ProcessOptions, Transformation};
use beng_core::translation::{ForwardMode, HeaderGroup, TranslationResponse};

/// Accumulates one `BEGIN ... END` reply into a [`TranslationResponse`]
/// (§3, §6). Returns `Ok(None)` if `buf` doesn't yet contain a full `END`.
pub fn decode_response(buf: &[u8]) -> Result<Option<(TranslationResponse, usize)>, BengError> {
    let mut offset = 0;
    let mut resp = TranslationResponse::default();
    let mut kind: Option<AddressKind> = None;
    let mut base: Option<String> = None;
    let mut expand_path: Option<String> = None;
    let mut expand_path_info: Option<String> = None;

    loop {
        let Some((packet, consumed)) = decode(&buf[offset..])? else {
            return Ok(None);
        };
        offset += consumed;

        match packet.command {
            Command::Begin => {}
            Command::End => {
                if let Some(kind) = kind.take() {
                    resp.address = Some(ResourceAddress {
                        kind,
                        base,
                        expand_path,
                        expand_path_info,
                    });
                }
                return Ok(Some((resp, offset)));
            }
            Command::Proxy => {
                let addr = payload_as_str(&packet.payload)?.to_string();
                kind = Some(AddressKind::Http {
                    ssl: false,
                    host_port: addr.clone(),
                    path: "/".into(),
                    addresses: vec![addr],
                    certificate: None,
                });
            }
            Command::Path => {
                kind = Some(AddressKind::Local {
                    path: payload_as_str(&packet.payload)?.to_string(),
                    content_type: None,
                });
            }
            Command::ContentType => {
                let ct = payload_as_str(&packet.payload)?.to_string();
                match &mut kind {
                    Some(AddressKind::Local { content_type, .. })
                    | Some(AddressKind::Nfs { content_type, .. }) => *content_type = Some(ct),
                    _ => {}
                }
            }
            Command::Cgi => {
                kind = Some(AddressKind::Cgi {
                    executable: payload_as_str(&packet.payload)?.to_string(),
                    path_info: None,
                    options: Vec::new(),
                });
            }
            Command::FastCgi => {
                kind = Some(AddressKind::FastCgi {
                    executable: String::new(),
                    addresses: vec![payload_as_str(&packet.payload)?.to_string()],
                    options: Vec::new(),
                });
            }
            Command::Was => {
                kind = Some(AddressKind::Was {
                    executable: payload_as_str(&packet.payload)?.to_string(),
                    options: Vec::new(),
                });
            }
            Command::Pipe => {
                kind = Some(AddressKind::Pipe {
                    cmd: payload_as_str(&packet.payload)?.to_string(),
                    args: Vec::new(),
                    options: Vec::new(),
                });
            }
            Command::Base => base = Some(payload_as_str(&packet.payload)?.to_string()),
            Command::ExpandPath => {
                expand_path = Some(payload_as_str(&packet.payload)?.to_string())
            }
            Command::ExpandPathInfo => {
                expand_path_info = Some(payload_as_str(&packet.payload)?.to_string())
            }
            Command::Status => {
                if packet.payload.len() >= 2 {
                    resp.status = Some(u16::from_le_bytes([packet.payload[0], packet.payload[1]]));
                }
            }
            Command::Redirect => resp.redirect = Some(payload_as_str(&packet.payload)?.to_string()),
            Command::Bounce => resp.bounce = Some(payload_as_str(&packet.payload)?.to_string()),
            Command::Filter => {
                let addr = payload_as_str(&packet.payload)?.to_string();
                resp.transformations.push(Transformation::Filter {
                    address: ResourceAddress::new(AddressKind::Http {
                        ssl: false,
                        host_port: addr.clone(),
                        path: "/".into(),
                        addresses: vec![addr],
                        certificate: None,
                    }),
                    reveal_user: false,
                });
            }
            Command::Process => resp
                .transformations
                .push(Transformation::ProcessXml(ProcessOptions::default())),
            Command::ProcessCss => resp
                .transformations
                .push(Transformation::ProcessCss(ProcessOptions::default())),
            Command::ProcessText => resp.transformations.push(Transformation::ProcessText),
            Command::Session => resp.session = Some(packet.payload.clone()),
            Command::Realm => resp.realm = Some(payload_as_str(&packet.payload)?.to_string()),
            Command::MaxAge => {
                if packet.payload.len() >= 4 {
                    resp.max_age = Some(u32::from_le_bytes([
                        packet.payload[0],
                        packet.payload[1],
                        packet.payload[2],
                        packet.payload[3],
                    ]));
                }
            }
            Command::Vary => resp.vary.push(payload_as_str(&packet.payload)?.to_string()),
            Command::Invalidate => resp
                .invalidate
                .push(payload_as_str(&packet.payload)?.to_string()),
            Command::Check => resp.check = Some(packet.payload.clone()),
            Command::Previous => resp.previous = true,
            Command::View => resp.view = Some(payload_as_str(&packet.payload)?.to_string()),
            Command::SecureView => {
                resp.secure_view = Some(payload_as_str(&packet.payload)?.to_string())
            }
            Command::HeaderForward => {
                if let [group, mode] = packet.payload.as_slice() {
                    if let (Some(group), Some(mode)) = (HeaderGroup::from_code(*group), ForwardMode::from_code(*mode)) {
                        resp.header_forwarding.set(group, mode);
                    }
                }
            }
            Command::Regex | Command::InverseRegex | Command::Uri | Command::Host
            | Command::RemoteHost | Command::UserAgent | Command::QueryString
            | Command::Ajp | Command::Unknown(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_empty, encode_str};

    fn wrap(inner: Vec<u8>) -> Vec<u8> {
        let mut out = encode_empty(Command::Begin);
        out.extend(inner);
        out.extend(encode_empty(Command::End));
        out
    }

    #[test]
    fn decodes_a_proxy_address() {
        let wire = wrap(encode_str(Command::Proxy, "127.0.0.1:8080"));
        let (resp, consumed) = decode_response(&wire).unwrap().unwrap();
        assert_eq!(consumed, wire.len());
        match resp.address.unwrap().kind {
            AddressKind::Http { host_port, .. } => assert_eq!(host_port, "127.0.0.1:8080"),
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn decodes_a_redirect_short_circuit() {
        let wire = wrap(encode_str(Command::Redirect, "https://example.com/"));
        let (resp, _) = decode_response(&wire).unwrap().unwrap();
        assert!(resp.is_short_circuit());
        assert_eq!(resp.redirect.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn decodes_a_check_reentry_token() {
        let mut inner = Vec::new();
        inner.extend(encode_str(Command::Path, "/x"));
        inner.extend(crate::protocol::encode(Command::Check, &[9, 9, 9]));
        let wire = wrap(inner);
        let (resp, _) = decode_response(&wire).unwrap().unwrap();
        assert!(resp.needs_reentry());
        assert_eq!(resp.check, Some(vec![9, 9, 9]));
    }

    #[test]
    fn incomplete_reply_asks_for_more_bytes() {
        let wire = wrap(encode_str(Command::Proxy, "x"));
        assert!(decode_response(&wire[..wire.len() - 2]).unwrap().is_none());
    }

    #[test]
    fn process_packet_adds_an_xml_transformation() {
        let wire = wrap(encode_empty(Command::Process));
        let (resp, _) = decode_response(&wire).unwrap().unwrap();
        assert_eq!(resp.transformations.len(), 1);
        assert!(resp.transformations.has_processor());
    }

    #[test]
    fn header_forward_packet_overrides_the_default_policy() {
        let wire = wrap(crate::protocol::encode(
            Command::HeaderForward,
            &[HeaderGroup::Auth.code(), ForwardMode::Yes.code()],
        ));
        let (resp, _) = decode_response(&wire).unwrap().unwrap();
        assert_eq!(resp.header_forwarding.mode_for(HeaderGroup::Auth), ForwardMode::Yes);
    }

    #[test]
    fn a_malformed_header_forward_payload_is_ignored() {
        let wire = wrap(crate::protocol::encode(Command::HeaderForward, &[1]));
        let (resp, _) = decode_response(&wire).unwrap().unwrap();
        assert_eq!(
            resp.header_forwarding.mode_for(HeaderGroup::Cookie),
            beng_core::translation::HeaderForwardingPolicy::default().mode_for(HeaderGroup::Cookie)
        );
    }
}
