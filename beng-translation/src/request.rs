use crate::protocol::{encode_empty, encode_str, Command};

/// Fields sent to the translation server to resolve a request (§3
/// "Translation request", §4.7 step 2).
#[derive(Debug, Clone, Default)]
pub struct TranslateRequest {
    pub uri: String,
    pub host: Option<String>,
    pub remote_host: Option<String>,
    pub user_agent: Option<String>,
    pub query_string: Option<String>,
    pub session: Option<Vec<u8>>,
    /// Echoed back unchanged on a `CHECK` re-entry round-trip (§4.7 step 5).
    pub check: Option<Vec<u8>>,
    /// Set instead of `uri` when resolving a widget class by name
    /// (§4.8 step 1, `WIDGET_TYPE`).
    pub widget_type: Option<String>,
}

impl TranslateRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// A lookup for a widget class by name rather than a URI.
    pub fn for_widget_type(type_name: impl Into<String>) -> Self {
        Self {
            widget_type: Some(type_name.into()),
            ..Default::default()
        }
    }

    /// Serializes the whole `BEGIN ... END` packet sequence.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend(encode_empty(Command::Begin));
        if let Some(widget_type) = &self.widget_type {
            out.extend(encode_str(Command::WidgetType, widget_type));
        } else {
            out.extend(encode_str(Command::Uri, &self.uri));
        }
        if let Some(host) = &self.host {
            out.extend(encode_str(Command::Host, host));
        }
        if let Some(rh) = &self.remote_host {
            out.extend(encode_str(Command::RemoteHost, rh));
        }
        if let Some(ua) = &self.user_agent {
            out.extend(encode_str(Command::UserAgent, ua));
        }
        if let Some(qs) = &self.query_string {
            out.extend(encode_str(Command::QueryString, qs));
        }
        if let Some(session) = &self.session {
            out.extend(crate::protocol::encode(Command::Session, session));
        }
        if let Some(check) = &self.check {
            out.extend(crate::protocol::encode(Command::Check, check));
        }
        out.extend(encode_empty(Command::End));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    #[test]
    fn encodes_begin_uri_end_for_a_minimal_request() {
        let req = TranslateRequest::new("/foo");
        let wire = req.encode();
        let (p1, n1) = decode(&wire).unwrap().unwrap();
        assert_eq!(p1.command, Command::Begin);
        let (p2, n2) = decode(&wire[n1..]).unwrap().unwrap();
        assert_eq!(p2.command, Command::Uri);
        assert_eq!(p2.payload, b"/foo");
        let (p3, _) = decode(&wire[n1 + n2..]).unwrap().unwrap();
        assert_eq!(p3.command, Command::End);
    }

    #[test]
    fn carries_the_check_token_when_present() {
        let mut req = TranslateRequest::new("/foo");
        req.check = Some(vec![1, 2, 3]);
        let wire = req.encode();
        assert!(wire.len() > TranslateRequest::new("/foo").encode().len());
    }
}
