use beng_core::error::{BengError, FramingKind};
use beng_core::http::{HeaderMap, Method};

const MAX_HEADERS_BYTES: usize = 64 * 1024;
const MAX_HEADER_COUNT: usize = 128;

/// What follows a parsed request/response head (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    None,
    Fixed(u64),
    Chunked,
    /// Response body runs until the connection closes (HTTP/1.0, or
    /// HTTP/1.1 with neither `Content-Length` nor `Transfer-Encoding`).
    UntilClose,
}

pub struct ParsedRequestHead {
    pub method: Method,
    pub target: String,
    pub version_minor: u8,
    pub headers: HeaderMap,
    pub consumed: usize,
}

pub struct ParsedResponseHead {
    pub status: u16,
    pub version_minor: u8,
    pub headers: HeaderMap,
    pub consumed: usize,
}

fn collect_headers(raw: &[httparse::Header], out: &mut HeaderMap) {
    for h in raw {
        if h.name.is_empty() {
            break;
        }
        let value = std::str::from_utf8(h.value).unwrap_or("");
        out.insert(h.name, value);
    }
}

/// Parses a request line + headers out of `buf`. `Ok(None)` means more
/// bytes are needed; a parse failure is a [`FramingKind`] error.
pub fn parse_request_head(buf: &[u8]) -> Result<Option<ParsedRequestHead>, BengError> {
    if buf.len() > MAX_HEADERS_BYTES {
        return Err(FramingKind::HeadersTooLarge.into());
    }
    let mut raw = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let mut req = httparse::Request::new(&mut raw);
    let status = req
        .parse(buf)
        .map_err(|_| FramingKind::MalformedRequestLine)?;
    let consumed = match status {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let method_bytes = req.method.unwrap_or("").as_bytes();
    let method = Method::parse(method_bytes).ok_or(FramingKind::UnsupportedMethod)?;
    let version_minor = req.version.ok_or(FramingKind::UnsupportedVersion)?;
    if version_minor > 1 {
        return Err(FramingKind::UnsupportedVersion.into());
    }
    let target = req.path.unwrap_or("/").to_string();

    let mut headers = HeaderMap::new();
    collect_headers(req.headers, &mut headers);

    Ok(Some(ParsedRequestHead {
        method,
        target,
        version_minor,
        headers,
        consumed,
    }))
}

/// Parses a status line + headers out of `buf` (the upstream-facing
/// symmetric half of the framing layer, §4.3).
pub fn parse_response_head(buf: &[u8]) -> Result<Option<ParsedResponseHead>, BengError> {
    if buf.len() > MAX_HEADERS_BYTES {
        return Err(FramingKind::HeadersTooLarge.into());
    }
    let mut raw = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let mut resp = httparse::Response::new(&mut raw);
    let status = resp
        .parse(buf)
        .map_err(|_| FramingKind::MalformedStatusLine)?;
    let consumed = match status {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };
    let version_minor = resp.version.ok_or(FramingKind::UnsupportedVersion)?;
    let status_code = resp.code.ok_or(FramingKind::MalformedStatusLine)?;

    let mut headers = HeaderMap::new();
    collect_headers(resp.headers, &mut headers);

    Ok(Some(ParsedResponseHead {
        status: status_code,
        version_minor,
        headers,
        consumed,
    }))
}

/// Resolves how a message body is delimited (§4.3). `Transfer-Encoding:
/// chunked` always wins over `Content-Length` when both are present — the
/// legacy precedence this proxy retains (see the design notes on this
/// ambiguity).
pub fn resolve_body_length(
    headers: &HeaderMap,
    is_request: bool,
    method: Option<Method>,
    status: Option<u16>,
) -> Result<BodyLength, BengError> {
    if let Some(status) = status {
        if matches!(status, 100..=199 | 204 | 304) {
            return Ok(BodyLength::None);
        }
    }
    if method == Some(Method::Head) {
        return Ok(BodyLength::None);
    }

    if headers.has_token("transfer-encoding", "chunked") {
        return Ok(BodyLength::Chunked);
    }

    if let Some(cl) = headers.get("content-length") {
        let n: u64 = cl.trim().parse().map_err(|_| FramingKind::InvalidContentLength)?;
        return Ok(BodyLength::Fixed(n));
    }

    if is_request {
        // No Transfer-Encoding and no Content-Length on a request means no
        // body at all (§4.3).
        Ok(BodyLength::None)
    } else {
        Ok(BodyLength::UntilClose)
    }
}

/// Whether the client expects a `100 Continue` interim response before
/// sending its body (§4.3, §5).
pub fn expects_100_continue(headers: &HeaderMap, version_minor: u8) -> bool {
    version_minor >= 1 && headers.get_all("expect").any(|v| v.eq_ignore_ascii_case("100-continue"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_get_request() {
        let buf = b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let head = parse_request_head(buf).unwrap().unwrap();
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.target, "/foo");
        assert_eq!(head.version_minor, 1);
        assert_eq!(head.headers.get("host"), Some("example.com"));
        assert_eq!(head.consumed, buf.len());
    }

    #[test]
    fn partial_request_asks_for_more_bytes() {
        let buf = b"GET /foo HTTP/1.1\r\nHost: exam";
        assert!(parse_request_head(buf).unwrap().is_none());
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let buf = b"BREW /coffee HTTP/1.1\r\n\r\n";
        let err = parse_request_head(buf).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn oversized_headers_are_rejected_before_parsing() {
        let mut buf = b"GET / HTTP/1.1\r\n".to_vec();
        buf.extend(std::iter::repeat(b'x').take(MAX_HEADERS_BYTES + 1));
        assert!(parse_request_head(&buf).is_err());
    }

    #[test]
    fn chunked_transfer_encoding_wins_over_content_length() {
        let mut h = HeaderMap::new();
        h.insert("content-length", "10");
        h.insert("transfer-encoding", "chunked");
        let bl = resolve_body_length(&h, true, Some(Method::Post), None).unwrap();
        assert_eq!(bl, BodyLength::Chunked);
    }

    #[test]
    fn fixed_content_length_is_honored() {
        let mut h = HeaderMap::new();
        h.insert("content-length", "42");
        let bl = resolve_body_length(&h, true, Some(Method::Post), None).unwrap();
        assert_eq!(bl, BodyLength::Fixed(42));
    }

    #[test]
    fn invalid_content_length_is_rejected() {
        let mut h = HeaderMap::new();
        h.insert("content-length", "not-a-number");
        assert!(resolve_body_length(&h, true, Some(Method::Post), None).is_err());
    }

    #[test]
    fn head_request_never_has_a_body() {
        let h = HeaderMap::new();
        let bl = resolve_body_length(&h, false, Some(Method::Head), Some(200)).unwrap();
        assert_eq!(bl, BodyLength::None);
    }

    #[test]
    fn response_without_framing_headers_runs_until_close() {
        let h = HeaderMap::new();
        let bl = resolve_body_length(&h, false, None, Some(200)).unwrap();
        assert_eq!(bl, BodyLength::UntilClose);
    }

    #[test]
    fn expect_100_continue_is_detected() {
        let mut h = HeaderMap::new();
        h.insert("expect", "100-continue");
        assert!(expects_100_continue(&h, 1));
    }
}
