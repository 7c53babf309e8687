use crate::core::{ByteStream, Length, StreamHandler};
use beng_core::BengError;

/// Truncates an inner stream to at most `limit` bytes, closing the inner
/// stream once the limit is reached (used to cap inline widget bodies and
/// `HEAD`-equivalent previews).
pub struct HeadStream {
    inner: Box<dyn ByteStream>,
    remaining: u64,
    done: bool,
}

impl HeadStream {
    pub fn new(inner: Box<dyn ByteStream>, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            done: limit == 0,
        }
    }
}

struct TruncatingHandler<'a> {
    inner: &'a mut dyn StreamHandler,
    remaining: &'a mut u64,
    hit_limit: &'a mut bool,
}

impl<'a> StreamHandler for TruncatingHandler<'a> {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        let cap = (*self.remaining).min(buf.len() as u64) as usize;
        let consumed = self.inner.on_data(&buf[..cap]);
        *self.remaining -= consumed as u64;
        if *self.remaining == 0 {
            *self.hit_limit = true;
        }
        consumed
    }

    fn on_eof(&mut self) {
        self.inner.on_eof();
    }

    fn on_error(&mut self, err: BengError) {
        self.inner.on_error(err);
    }
}

impl ByteStream for HeadStream {
    fn declared_length(&self) -> Length {
        match self.inner.declared_length() {
            Length::Exact(n) => Length::Exact(n.min(self.remaining)),
            _ => Length::Estimate(self.remaining),
        }
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if self.done {
            return;
        }
        if self.remaining == 0 {
            self.done = true;
            self.inner.close();
            handler.on_eof();
            return;
        }
        let mut hit_limit = false;
        {
            let mut th = TruncatingHandler {
                inner: handler,
                remaining: &mut self.remaining,
                hit_limit: &mut hit_limit,
            };
            self.inner.read(&mut th);
        }
        if hit_limit {
            self.done = true;
            self.inner.close();
            handler.on_eof();
        }
    }

    fn close(&mut self) {
        self.done = true;
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn truncates_to_the_limit() {
        let mut s = HeadStream::new(Box::new(MemoryStream::new(&b"0123456789"[..])), 4);
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"0123");
        assert!(h.eof);
    }

    #[test]
    fn passes_through_shorter_streams_unchanged() {
        let mut s = HeadStream::new(Box::new(MemoryStream::new(&b"ab"[..])), 100);
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"ab");
        assert!(h.eof);
    }

    #[test]
    fn zero_limit_is_immediately_eof() {
        let mut s = HeadStream::new(Box::new(MemoryStream::new(&b"ab"[..])), 0);
        let h = drain(&mut s, 4);
        assert!(h.data.is_empty());
        assert!(h.eof);
    }
}
