use crate::core::{ByteStream, Length, SkipResult, StreamHandler};
use bytes::Bytes;

/// A stream backed by an in-memory buffer. Terminal: finite and immediate.
pub struct MemoryStream {
    data: Bytes,
    pos: usize,
    done: bool,
}

impl MemoryStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            done: false,
        }
    }
}

/// Convenience constructor mirroring the source-tree's separate `istring`
/// operator: a `MemoryStream` over a UTF-8 string's bytes.
pub fn string_stream(s: impl Into<String>) -> MemoryStream {
    MemoryStream::new(Bytes::from(s.into().into_bytes()))
}

impl ByteStream for MemoryStream {
    fn declared_length(&self) -> Length {
        Length::Exact((self.data.len() - self.pos) as u64)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if self.done {
            return;
        }
        if self.pos >= self.data.len() {
            self.done = true;
            handler.on_eof();
            return;
        }
        let consumed = handler.on_data(&self.data[self.pos..]).min(self.data.len() - self.pos);
        self.pos += consumed;
        if self.pos >= self.data.len() {
            self.done = true;
            handler.on_eof();
        }
    }

    fn skip(&mut self, n: u64) -> SkipResult {
        let remaining = (self.data.len() - self.pos) as u64;
        let n = n.min(remaining);
        self.pos += n as usize;
        SkipResult::Skipped(n)
    }

    fn close(&mut self) {
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;

    #[test]
    fn yields_the_whole_buffer_then_eof() {
        let mut s = MemoryStream::new(Bytes::from_static(b"hello"));
        let h = drain(&mut s, 16);
        assert_eq!(h.data, b"hello");
        assert!(h.eof);
    }

    #[test]
    fn skip_advances_position() {
        let mut s = MemoryStream::new(Bytes::from_static(b"hello world"));
        assert_eq!(s.skip(6), SkipResult::Skipped(6));
        let h = drain(&mut s, 16);
        assert_eq!(h.data, b"world");
    }

    #[test]
    fn string_stream_helper() {
        let mut s = string_stream("abc");
        let h = drain(&mut s, 16);
        assert_eq!(h.data, b"abc");
    }
}
