use crate::core::{ByteStream, Length, SourceKindMask, StreamHandler};
use std::cell::RefCell;
use std::rc::Rc;

/// Reference-counts a single underlying stream across several `tee`-style
/// consumers, so the inner stream is only closed once every handle has
/// gone away. Unlike the source implementation's manual counter, this
/// relies on `Rc`'s own strong count.
pub struct HoldStream {
    inner: Rc<RefCell<Box<dyn ByteStream>>>,
}

impl HoldStream {
    pub fn new(inner: Box<dyn ByteStream>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Creates another handle sharing the same underlying stream.
    pub fn share(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl ByteStream for HoldStream {
    fn declared_length(&self) -> Length {
        self.inner.borrow().declared_length()
    }

    fn source_kinds(&self) -> SourceKindMask {
        self.inner.borrow().source_kinds()
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        self.inner.borrow_mut().read(handler);
    }

    fn close(&mut self) {
        if Rc::strong_count(&self.inner) <= 1 {
            self.inner.borrow_mut().close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn shared_handles_see_the_same_stream() {
        let mut a = HoldStream::new(Box::new(MemoryStream::new(&b"shared"[..])));
        let b = a.share();
        assert_eq!(a.handle_count(), 2);
        let h = drain(&mut a, 8);
        assert_eq!(h.data, b"shared");
        drop(b);
        assert_eq!(a.handle_count(), 1);
    }

    #[test]
    fn close_only_propagates_once_all_handles_are_gone() {
        let mut a = HoldStream::new(Box::new(MemoryStream::new(&b"x"[..])));
        let mut b = a.share();
        a.close();
        // `b` still holds a live reference, inner stream must still work.
        let h = drain(&mut b, 4);
        assert_eq!(h.data, b"x");
    }
}
