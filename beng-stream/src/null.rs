use crate::core::{ByteStream, Length, StreamHandler};

/// A stream that is immediately at EOF with zero bytes.
#[derive(Default)]
pub struct NullStream {
    done: bool,
}

impl NullStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStream for NullStream {
    fn declared_length(&self) -> Length {
        Length::Exact(0)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if !self.done {
            self.done = true;
            handler.on_eof();
        }
    }

    fn close(&mut self) {
        self.done = true;
    }
}
