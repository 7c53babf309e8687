use crate::core::{ByteStream, StreamHandler};
use beng_core::BengError;
use std::os::unix::io::RawFd;

/// Drains a stream to completion, discarding its bytes (used to read an
/// upstream body to EOF after a `HEAD`-equivalent short-circuit).
pub struct NullSink;

impl StreamHandler for NullSink {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }
}

/// Collects a stream's bytes into an in-memory buffer, bounded by
/// `max_bytes` (the cache-admission body-size budget, §4.6).
pub struct MemorySink {
    pub buffer: Vec<u8>,
    max_bytes: usize,
    pub overflowed: bool,
    pub eof: bool,
    pub error: Option<BengError>,
}

impl MemorySink {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
            overflowed: false,
            eof: false,
            error: None,
        }
    }
}

impl StreamHandler for MemorySink {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        if self.buffer.len() + buf.len() > self.max_bytes {
            self.overflowed = true;
            return 0;
        }
        self.buffer.extend_from_slice(buf);
        buf.len()
    }

    fn on_eof(&mut self) {
        self.eof = true;
    }

    fn on_error(&mut self, err: BengError) {
        self.error = Some(err);
    }
}

/// Allocation target for [`RubberSink`], satisfied by `beng-cache`'s rubber
/// arena without this crate depending on it (mirrors the `CacheItem<P>`
/// generic-payload pattern in `beng-core`).
pub trait RubberAllocator {
    type Handle;

    fn alloc(&mut self, size_hint: usize) -> Option<Self::Handle>;
    fn write(&mut self, handle: &Self::Handle, offset: usize, data: &[u8]) -> bool;
    fn shrink(&mut self, handle: &Self::Handle, new_size: usize);
}

/// Streams a body directly into a rubber-arena allocation as it arrives,
/// shrinking the allocation to the actual size once EOF is reached.
pub struct RubberSink<A: RubberAllocator> {
    allocator: A,
    handle: Option<A::Handle>,
    written: usize,
    pub eof: bool,
    pub failed: bool,
}

impl<A: RubberAllocator> RubberSink<A> {
    pub fn new(mut allocator: A, size_hint: usize) -> Self {
        let handle = allocator.alloc(size_hint);
        Self {
            allocator,
            failed: handle.is_none(),
            handle,
            written: 0,
            eof: false,
        }
    }

    pub fn into_handle(self) -> Option<A::Handle> {
        self.handle
    }
}

impl<A: RubberAllocator> StreamHandler for RubberSink<A> {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        let Some(handle) = &self.handle else {
            self.failed = true;
            return 0;
        };
        if self.allocator.write(handle, self.written, buf) {
            self.written += buf.len();
            buf.len()
        } else {
            self.failed = true;
            0
        }
    }

    fn on_eof(&mut self) {
        self.eof = true;
        if let Some(handle) = &self.handle {
            self.allocator.shrink(handle, self.written);
        }
    }

    fn on_error(&mut self, _err: BengError) {
        self.failed = true;
    }
}

/// Drains `stream` into `fd` via plain `write(2)` (used for the rare
/// direct-to-socket sink path that doesn't go through the framing layer).
pub fn sink_to_fd(stream: &mut dyn ByteStream, fd: RawFd) -> std::io::Result<usize> {
    struct FdHandler {
        fd: RawFd,
        total: usize,
        err: Option<std::io::Error>,
    }
    impl StreamHandler for FdHandler {
        fn on_data(&mut self, buf: &[u8]) -> usize {
            let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const _, buf.len()) };
            if n < 0 {
                self.err = Some(std::io::Error::last_os_error());
                return 0;
            }
            self.total += n as usize;
            n as usize
        }
    }
    let mut h = FdHandler {
        fd,
        total: 0,
        err: None,
    };
    for _ in 0..64 {
        stream.read(&mut h);
        if h.err.is_some() {
            break;
        }
    }
    match h.err {
        Some(e) => Err(e),
        None => Ok(h.total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStream;

    #[test]
    fn memory_sink_collects_within_budget() {
        let mut s = MemoryStream::new(&b"hello"[..]);
        let mut sink = MemorySink::new(10);
        for _ in 0..4 {
            s.read(&mut sink);
        }
        assert_eq!(sink.buffer, b"hello");
        assert!(sink.eof);
        assert!(!sink.overflowed);
    }

    #[test]
    fn memory_sink_flags_overflow_past_budget() {
        let mut s = MemoryStream::new(&b"hello world"[..]);
        let mut sink = MemorySink::new(3);
        s.read(&mut sink);
        assert!(sink.overflowed);
    }

    struct FakeAllocator {
        data: Vec<u8>,
    }

    impl RubberAllocator for FakeAllocator {
        type Handle = ();

        fn alloc(&mut self, size_hint: usize) -> Option<()> {
            self.data = vec![0u8; size_hint];
            Some(())
        }

        fn write(&mut self, _handle: &(), offset: usize, data: &[u8]) -> bool {
            if offset + data.len() > self.data.len() {
                self.data.resize(offset + data.len(), 0);
            }
            self.data[offset..offset + data.len()].copy_from_slice(data);
            true
        }

        fn shrink(&mut self, _handle: &(), new_size: usize) {
            self.data.truncate(new_size);
        }
    }

    #[test]
    fn rubber_sink_writes_through_to_the_allocator() {
        let mut s = MemoryStream::new(&b"cached body"[..]);
        let allocator = FakeAllocator { data: Vec::new() };
        let mut sink = RubberSink::new(allocator, 32);
        for _ in 0..4 {
            s.read(&mut sink);
        }
        assert!(sink.eof);
        assert!(!sink.failed);
        assert_eq!(sink.allocator.data, b"cached body");
    }
}
