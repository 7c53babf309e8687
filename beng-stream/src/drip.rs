use crate::core::{ByteStream, Length, StreamHandler};

/// A test aid that releases its buffer one byte per `read()` call,
/// deliberately exercising consumers that assume a stream always offers
/// everything it has at once (§8 back-pressure scenarios).
pub struct ByteDripStream {
    data: Vec<u8>,
    pos: usize,
    done: bool,
}

impl ByteDripStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            done: false,
        }
    }
}

impl ByteStream for ByteDripStream {
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
        let consumed = handler.on_data(&self.data[self.pos..self.pos + 1]);
        self.pos += consumed.min(1);
    }

    fn close(&mut self) {
        self.done = true;
    }
}
