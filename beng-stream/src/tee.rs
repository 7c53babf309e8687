use crate::core::{ByteStream, Length, StreamHandler};
use crate::growing_buffer::GrowingBuffer;
use beng_core::BengError;
use std::cell::RefCell;
use std::rc::Rc;

struct TeeShared {
    source: Box<dyn ByteStream>,
    buffer: GrowingBuffer,
    base_offset: u64,
    eof: bool,
    error: Option<String>,
}

struct BufferingHandler<'a> {
    buffer: &'a mut GrowingBuffer,
    eof: &'a mut bool,
    error: &'a mut Option<String>,
}

impl<'a> StreamHandler for BufferingHandler<'a> {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        self.buffer.append(buf);
        buf.len()
    }

    fn on_eof(&mut self) {
        *self.eof = true;
    }

    fn on_error(&mut self, err: BengError) {
        *self.error = Some(err.to_string());
    }
}

/// One consumer's view of a `tee`-split stream (§4.1). Each branch tracks
/// its own read offset; bytes stay buffered until the slower branch has
/// also consumed them, so a fast branch backs off rather than racing
/// ahead unboundedly.
pub struct TeeBranch {
    shared: Rc<RefCell<TeeShared>>,
    offset: u64,
}

/// Splits `source` into two independently-paced consumers.
pub fn tee(source: Box<dyn ByteStream>) -> (TeeBranch, TeeBranch) {
    let shared = Rc::new(RefCell::new(TeeShared {
        source,
        buffer: GrowingBuffer::new(4096),
        base_offset: 0,
        eof: false,
        error: None,
    }));
    (
        TeeBranch {
            shared: Rc::clone(&shared),
            offset: 0,
        },
        TeeBranch { shared, offset: 0 },
    )
}

impl ByteStream for TeeBranch {
    fn declared_length(&self) -> Length {
        self.shared.borrow().source.declared_length()
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        let mut shared = self.shared.borrow_mut();
        let local = (self.offset - shared.base_offset) as usize;

        if local >= shared.buffer.len() {
            if shared.eof {
                handler.on_eof();
                return;
            }
            if let Some(msg) = shared.error.clone() {
                handler.on_error(BengError::Unclassified(msg));
                return;
            }
            let TeeShared {
                source,
                buffer,
                eof,
                error,
                ..
            } = &mut *shared;
            let mut bh = BufferingHandler { buffer, eof, error };
            source.read(&mut bh);
        }

        let local = (self.offset - shared.base_offset) as usize;
        if local < shared.buffer.len() {
            let whole = shared.buffer.to_vec();
            let consumed = handler.on_data(&whole[local..]);
            self.offset += consumed as u64;
        } else if shared.eof {
            handler.on_eof();
        } else if let Some(msg) = shared.error.clone() {
            handler.on_error(BengError::Unclassified(msg));
        }
    }

    fn close(&mut self) {
        if Rc::strong_count(&self.shared) <= 1 {
            self.shared.borrow_mut().source.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn both_branches_see_the_full_content_independently() {
        let (mut a, mut b) = tee(Box::new(MemoryStream::new(&b"duplicate me"[..])));
        let ha = drain(&mut a, 16);
        let hb = drain(&mut b, 16);
        assert_eq!(ha.data, b"duplicate me");
        assert_eq!(hb.data, b"duplicate me");
        assert!(ha.eof && hb.eof);
    }

    #[test]
    fn a_slower_branch_does_not_lose_bytes_already_delivered_to_the_other() {
        let (mut a, mut b) = tee(Box::new(MemoryStream::new(&b"0123456789"[..])));
        let _ = drain(&mut a, 16);
        // `b` starts reading only after `a` fully drained the source.
        let hb = drain(&mut b, 16);
        assert_eq!(hb.data, b"0123456789");
    }
}
