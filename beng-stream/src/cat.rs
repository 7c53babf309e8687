use crate::core::{ByteStream, Length, StreamHandler};
use beng_core::BengError;

/// Concatenates several streams end to end, delivering a single EOF only
/// after the last one finishes.
pub struct CatStream {
    parts: std::collections::VecDeque<Box<dyn ByteStream>>,
    done: bool,
}

impl CatStream {
    pub fn new(parts: Vec<Box<dyn ByteStream>>) -> Self {
        Self {
            parts: parts.into(),
            done: false,
        }
    }
}

struct AdvanceHandler<'a> {
    inner: &'a mut dyn StreamHandler,
    advance: bool,
    errored: bool,
}

impl<'a> StreamHandler for AdvanceHandler<'a> {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        self.inner.on_data(buf)
    }

    fn on_eof(&mut self) {
        self.advance = true;
    }

    fn on_error(&mut self, err: BengError) {
        self.errored = true;
        self.inner.on_error(err);
    }
}

impl ByteStream for CatStream {
    fn declared_length(&self) -> Length {
        let mut total = 0u64;
        for p in &self.parts {
            match p.declared_length() {
                Length::Exact(n) => total += n,
                _ => return Length::Unknown,
            }
        }
        Length::Exact(total)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if self.done {
            return;
        }
        loop {
            let Some(front) = self.parts.front_mut() else {
                self.done = true;
                handler.on_eof();
                return;
            };
            let mut adv = AdvanceHandler {
                inner: handler,
                advance: false,
                errored: false,
            };
            front.read(&mut adv);
            if adv.errored {
                self.done = true;
                return;
            }
            if adv.advance {
                self.parts.pop_front();
                continue;
            }
            return;
        }
    }

    fn close(&mut self) {
        self.done = true;
        for mut p in self.parts.drain(..) {
            p.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn concatenates_in_order() {
        let mut s = CatStream::new(vec![
            Box::new(MemoryStream::new(&b"foo"[..])),
            Box::new(MemoryStream::new(&b"bar"[..])),
        ]);
        let h = drain(&mut s, 16);
        assert_eq!(h.data, b"foobar");
        assert!(h.eof);
    }

    #[test]
    fn empty_parts_list_is_immediately_eof() {
        let mut s = CatStream::new(vec![]);
        let h = drain(&mut s, 4);
        assert!(h.eof);
        assert!(h.data.is_empty());
    }
}
