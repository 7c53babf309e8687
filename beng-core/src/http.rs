use serde::{Deserialize, Serialize};

/// Methods recognized on the client HTTP surface (§6). Unknown methods fail
/// with `Framing(UnsupportedMethod)` rather than being represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Propfind,
    Proppatch,
    Mkcol,
    Move,
    Copy,
    Lock,
    Unlock,
}

impl Method {
    /// Literal prefix match over the fixed method table (§4.3).
    pub fn parse(bytes: &[u8]) -> Option<Method> {
        match bytes {
            b"GET" => Some(Method::Get),
            b"HEAD" => Some(Method::Head),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            b"DELETE" => Some(Method::Delete),
            b"OPTIONS" => Some(Method::Options),
            b"TRACE" => Some(Method::Trace),
            b"PROPFIND" => Some(Method::Propfind),
            b"PROPPATCH" => Some(Method::Proppatch),
            b"MKCOL" => Some(Method::Mkcol),
            b"MOVE" => Some(Method::Move),
            b"COPY" => Some(Method::Copy),
            b"LOCK" => Some(Method::Lock),
            b"UNLOCK" => Some(Method::Unlock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Mkcol => "MKCOL",
            Method::Move => "MOVE",
            Method::Copy => "COPY",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
        }
    }

    /// Only GET/HEAD are cacheable (§4.6 admission rule).
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

/// An ordered, case-insensitive header map. Names are lowercased on
/// insertion (§4.3); duplicate names are preserved in insertion order so
/// e.g. `Cookie` accumulation (scenario A) round-trips faithfully.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderMap(Vec<(String, String)>);

impl HeaderMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.to_ascii_lowercase(), value.into()));
    }

    /// Value of the first occurrence of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let name = name.to_ascii_lowercase();
        self.0
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        self.0.retain(|(k, _)| *k != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive token match against a comma-separated header value,
    /// e.g. `Connection: keep-alive, Upgrade`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|v| {
            v.split(',')
                .map(|t| t.trim())
                .any(|t| t.eq_ignore_ascii_case(token))
        })
    }
}

/// HTTP request, server side (§3). Generic over the body stream type so
/// `beng-core` carries no dependency on the stream/socket crates.
#[derive(Debug, Clone)]
pub struct HttpRequest<B> {
    pub method: Method,
    pub target: String,
    pub version_minor: u8,
    pub headers: HeaderMap,
    pub body: Option<B>,
    pub local_addr: String,
    pub remote_addr: String,
}

impl<B> HttpRequest<B> {
    pub fn keep_alive_requested(&self) -> bool {
        if self.version_minor == 0 {
            // HTTP/1.0: keep-alive is always disabled (§4.3).
            return false;
        }
        !self.headers.has_token("connection", "close")
    }
}

/// HTTP response (§3).
#[derive(Debug, Clone)]
pub struct HttpResponse<B> {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<B>,
}

impl<B> HttpResponse<B> {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// A response is "empty-bodied" if status is 1xx/204/205/304 or the
    /// request method was HEAD; any application-supplied body is silently
    /// discarded in that case.
    pub fn is_empty_bodied(&self, request_method: Method) -> bool {
        matches!(self.status, 100..=199 | 204 | 205 | 304) || request_method == Method::Head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_matches_fixed_table() {
        assert_eq!(Method::parse(b"GET"), Some(Method::Get));
        assert_eq!(Method::parse(b"PROPFIND"), Some(Method::Propfind));
        assert_eq!(Method::parse(b"BREW"), None);
    }

    #[test]
    fn only_get_and_head_are_cacheable() {
        assert!(Method::Get.is_cacheable());
        assert!(Method::Head.is_cacheable());
        assert!(!Method::Post.is_cacheable());
    }

    #[test]
    fn header_names_are_lowercased_on_insert() {
        let mut h = HeaderMap::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn duplicate_headers_preserve_insertion_order() {
        let mut h = HeaderMap::new();
        h.insert("cookie", "foo=bar");
        h.insert("cookie", "a=b");
        let values: Vec<&str> = h.get_all("cookie").collect();
        assert_eq!(values, vec!["foo=bar", "a=b"]);
    }

    #[test]
    fn connection_close_token_match_is_case_insensitive() {
        let mut h = HeaderMap::new();
        h.insert("connection", "Keep-Alive, CLOSE");
        assert!(h.has_token("connection", "close"));
    }

    #[test]
    fn http_1_0_never_keeps_alive() {
        let req: HttpRequest<()> = HttpRequest {
            method: Method::Get,
            target: "/".into(),
            version_minor: 0,
            headers: HeaderMap::new(),
            body: None,
            local_addr: "127.0.0.1:80".into(),
            remote_addr: "10.0.0.1:1234".into(),
        };
        assert!(!req.keep_alive_requested());
    }

    #[test]
    fn response_with_204_is_empty_bodied() {
        let resp: HttpResponse<()> = HttpResponse::new(204);
        assert!(resp.is_empty_bodied(Method::Get));
    }

    #[test]
    fn head_response_is_always_empty_bodied() {
        let resp: HttpResponse<()> = HttpResponse::new(200);
        assert!(resp.is_empty_bodied(Method::Head));
        assert!(!resp.is_empty_bodied(Method::Get));
    }
}
