use beng_core::http::HeaderMap;
use beng_net::{parse_response_head, serialize_response_head};
use beng_stream::{ByteStream, Length, StreamHandler};
use std::cell::RefCell;
use std::rc::Rc;

/// Packs a status/headers/body triple into the bytes a [`PendingBody`]
/// carries, reusing the same head framing the upstream-facing half of the
/// proxy already speaks (§4.3).
pub fn encode_triple(status: u16, headers: &HeaderMap, body: &[u8]) -> Vec<u8> {
    let mut out = serialize_response_head(status, headers);
    out.extend_from_slice(body);
    out
}

/// Inverse of [`encode_triple`]. `None` only if the bytes aren't a
/// complete, well-formed head, which can't happen for anything this
/// module itself produced.
pub fn decode_triple(bytes: &[u8]) -> Option<(u16, HeaderMap, Vec<u8>)> {
    let head = parse_response_head(bytes).ok()??;
    let body = bytes[head.consumed..].to_vec();
    Some((head.status, head.headers, body))
}

/// A `ByteStream` that starts empty and is filled exactly once, by the
/// fetch that's actually talking to the upstream. Concurrent
/// `SingleFlight` joiners tee this same source instead of dispatching
/// their own request (§4.6, §8 scenario E).
#[derive(Clone)]
pub struct PendingBody {
    cell: Rc<RefCell<Option<Vec<u8>>>>,
    delivered: Rc<RefCell<bool>>,
}

impl PendingBody {
    pub fn new() -> Self {
        Self {
            cell: Rc::new(RefCell::new(None)),
            delivered: Rc::new(RefCell::new(false)),
        }
    }

    /// Makes the body available to every joined branch's next `read()`.
    pub fn fulfill(&self, body: Vec<u8>) {
        *self.cell.borrow_mut() = Some(body);
    }
}

impl ByteStream for PendingBody {
    fn declared_length(&self) -> Length {
        match &*self.cell.borrow() {
            Some(body) => Length::Exact(body.len() as u64),
            None => Length::Unknown,
        }
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if *self.delivered.borrow() {
            return;
        }
        let Some(body) = self.cell.borrow().clone() else {
            return;
        };
        let mut offset = 0;
        while offset < body.len() {
            let n = handler.on_data(&body[offset..]);
            if n == 0 {
                break;
            }
            offset += n;
        }
        handler.on_eof();
        *self.delivered.borrow_mut() = true;
    }

    fn close(&mut self) {
        *self.delivered.borrow_mut() = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beng_stream::drain;

    #[test]
    fn unfulfilled_pending_body_yields_nothing() {
        let mut p = PendingBody::new();
        let h = drain(&mut p, 16);
        assert!(h.data.is_empty());
        assert!(!h.eof);
    }

    #[test]
    fn fulfilling_delivers_the_body_once() {
        let mut p = PendingBody::new();
        p.fulfill(b"hello".to_vec());
        let h = drain(&mut p, 16);
        assert_eq!(h.data, b"hello");
        assert!(h.eof);
    }

    #[test]
    fn a_second_read_after_delivery_yields_nothing_more() {
        let mut p = PendingBody::new();
        p.fulfill(b"hi".to_vec());
        let _ = drain(&mut p, 16);
        let h = drain(&mut p, 4);
        assert!(h.data.is_empty());
    }

    #[test]
    fn encode_then_decode_round_trips_status_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain");
        let bytes = encode_triple(200, &headers, b"hello");
        let (status, headers, body) = decode_triple(&bytes).expect("well-formed head");
        assert_eq!(status, 200);
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(body, b"hello");
    }
}
