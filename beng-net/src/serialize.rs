use beng_core::http::{HeaderMap, HttpResponse, Method};
use std::fmt::Write as _;

fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        410 => "Gone",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Serializes a status line + headers as the wire bytes that precede the
/// body (§4.3). Does not write the body itself.
pub fn serialize_response_head(status: u16, headers: &HeaderMap) -> Vec<u8> {
    let mut out = String::with_capacity(256);
    let _ = write!(out, "HTTP/1.1 {} {}\r\n", status, reason_phrase(status));
    for (name, value) in headers.iter() {
        let _ = write!(out, "{}: {}\r\n", name, value);
    }
    out.push_str("\r\n");
    out.into_bytes()
}

pub fn response_head_bytes<B>(resp: &HttpResponse<B>) -> Vec<u8> {
    serialize_response_head(resp.status, &resp.headers)
}

/// Serializes a request line + headers for the upstream-facing half of the
/// proxy (§4.3/§4.7).
pub fn serialize_request_head(method: Method, target: &str, headers: &HeaderMap) -> Vec<u8> {
    let mut out = String::with_capacity(256);
    let _ = write!(out, "{} {} HTTP/1.1\r\n", method.as_str(), target);
    for (name, value) in headers.iter() {
        let _ = write!(out, "{}: {}\r\n", name, value);
    }
    out.push_str("\r\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_a_minimal_response_head() {
        let mut h = HeaderMap::new();
        h.insert("content-length", "5");
        let bytes = serialize_response_head(200, &h);
        assert_eq!(bytes, b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n");
    }

    #[test]
    fn serializes_a_request_head() {
        let mut h = HeaderMap::new();
        h.insert("host", "example.com");
        let bytes = serialize_request_head(Method::Get, "/x", &h);
        assert_eq!(bytes, b"GET /x HTTP/1.1\r\nhost: example.com\r\n\r\n");
    }
}
