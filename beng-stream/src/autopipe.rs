use crate::core::{ByteStream, DirectResult, Length, SourceKind, SourceKindMask, StreamHandler};
use beng_core::error::{BengError, SocketKind};
use std::os::unix::io::RawFd;

/// Interposes a real kernel pipe between a non-pipe source (e.g. a
/// `MemoryStream`) and a consumer that only accepts `on_direct` splicing
/// from a [`SourceKind::Pipe`]. Bytes are copied once, into the pipe; from
/// there the consumer can `splice(2)` them onward zero-copy.
///
/// Mirrors the source tree's `istream_pipe` filter, which exists purely to
/// make an in-process stream look like a pipe to the kernel-splice layer.
pub struct AutoPipeStream {
    inner: Box<dyn ByteStream>,
    read_fd: RawFd,
    write_fd: RawFd,
    inner_eof: bool,
    closed: bool,
}

struct FillHandler<'a> {
    write_fd: RawFd,
    wrote: &'a mut usize,
    blocked: &'a mut bool,
}

impl<'a> StreamHandler for FillHandler<'a> {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        let n = unsafe { libc::write(self.write_fd, buf.as_ptr() as *const _, buf.len()) };
        if n < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
                *self.blocked = true;
                return 0;
            }
            return 0;
        }
        *self.wrote += n as usize;
        n as usize
    }
}

impl AutoPipeStream {
    pub fn new(inner: Box<dyn ByteStream>) -> std::io::Result<Self> {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self {
            inner,
            read_fd: fds[0],
            write_fd: fds[1],
            inner_eof: false,
            closed: false,
        })
    }
}

impl ByteStream for AutoPipeStream {
    fn declared_length(&self) -> Length {
        self.inner.declared_length()
    }

    fn source_kinds(&self) -> SourceKindMask {
        SourceKindMask::of(SourceKind::Pipe)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if self.closed {
            return;
        }
        if !self.inner_eof {
            let mut wrote = 0usize;
            let mut blocked = false;
            let mut fh = FillHandler {
                write_fd: self.write_fd,
                wrote: &mut wrote,
                blocked: &mut blocked,
            };
            self.inner.read(&mut fh);
        }

        if handler.accepted_source_kinds().contains(SourceKind::Pipe) {
            match handler.on_direct(SourceKind::Pipe, self.read_fd, usize::MAX) {
                DirectResult::Transferred(_) => {}
                DirectResult::Eof => {
                    self.closed = true;
                    handler.on_eof();
                }
                DirectResult::Errno(e) => {
                    self.closed = true;
                    handler.on_error(BengError::Socket(SocketKind::Io(
                        std::io::Error::from_raw_os_error(e),
                    )));
                }
                DirectResult::Closed => self.closed = true,
                DirectResult::Blocking => {}
            }
            return;
        }

        let mut buf = [0u8; 8192];
        let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr() as *mut _, buf.len()) };
        if n > 0 {
            handler.on_data(&buf[..n as usize]);
        } else if n == 0 {
            self.closed = true;
            handler.on_eof();
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inner.close();
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

impl Drop for AutoPipeStream {
    fn drop(&mut self) {
        if !self.closed {
            unsafe {
                libc::close(self.read_fd);
                libc::close(self.write_fd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drain;
    use crate::memory::MemoryStream;

    #[test]
    fn relays_bytes_through_a_real_kernel_pipe() {
        let mut s = AutoPipeStream::new(Box::new(MemoryStream::new(&b"piped"[..]))).unwrap();
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"piped");
    }
}
