use crate::core::{ByteStream, Length, StreamHandler};

/// A stream whose real source isn't known yet (e.g. a response body
/// awaiting the translation server's reply). `read()` is a no-op until
/// [`DelayedStream::set_source`] is called.
#[derive(Default)]
pub struct DelayedStream {
    inner: Option<Box<dyn ByteStream>>,
    closed_early: bool,
}

impl DelayedStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&mut self, inner: Box<dyn ByteStream>) {
        if self.closed_early {
            let mut inner = inner;
            inner.close();
            return;
        }
        self.inner = Some(inner);
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_some()
    }
}

impl ByteStream for DelayedStream {
    fn declared_length(&self) -> Length {
        self.inner
            .as_ref()
            .map(|s| s.declared_length())
            .unwrap_or(Length::Unknown)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if let Some(inner) = self.inner.as_mut() {
            inner.read(handler);
        }
    }

    fn close(&mut self) {
        match self.inner.as_mut() {
            Some(inner) => inner.close(),
            None => self.closed_early = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn reads_nothing_before_a_source_is_installed() {
        let mut s = DelayedStream::new();
        let h = drain(&mut s, 4);
        assert!(h.data.is_empty());
        assert!(!h.eof);
    }

    #[test]
    fn delegates_once_a_source_arrives() {
        let mut s = DelayedStream::new();
        s.set_source(Box::new(MemoryStream::new(&b"late"[..])));
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"late");
        assert!(h.eof);
    }

    #[test]
    fn closing_before_a_source_arrives_closes_it_on_arrival() {
        let mut s = DelayedStream::new();
        s.close();
        s.set_source(Box::new(MemoryStream::new(&b"late"[..])));
        assert!(!s.is_resolved());
    }
}
