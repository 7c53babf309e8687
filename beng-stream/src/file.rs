use crate::core::{ByteStream, DirectResult, Length, SkipResult, SourceKind, SourceKindMask, StreamHandler};
use beng_core::error::{BengError, SocketKind};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::io::{AsRawFd, RawFd};

const CHUNK: usize = 32 * 1024;

/// A byte range over an open file (NFS/local-document bodies, §3
/// `ResourceAddress::Nfs`/`Local`). Supports zero-copy delivery via
/// `on_direct` and cheap `skip` via `lseek`.
pub struct FileStream {
    file: File,
    remaining: u64,
    done: bool,
}

impl FileStream {
    /// `offset..offset+length` within `file`; `file`'s cursor is
    /// repositioned to `offset` immediately.
    pub fn new_range(mut file: File, offset: u64, length: u64) -> std::io::Result<Self> {
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            file,
            remaining: length,
            done: length == 0,
        })
    }

    pub fn whole_file(file: File) -> std::io::Result<Self> {
        let len = file.metadata()?.len();
        Self::new_range(file, 0, len)
    }
}

impl ByteStream for FileStream {
    fn declared_length(&self) -> Length {
        Length::Exact(self.remaining)
    }

    fn source_kinds(&self) -> SourceKindMask {
        SourceKindMask::of(SourceKind::File)
    }

    fn read(&mut self, handler: &mut dyn StreamHandler) {
        if self.done {
            return;
        }
        if self.remaining == 0 {
            self.done = true;
            handler.on_eof();
            return;
        }

        if handler.accepted_source_kinds().contains(SourceKind::File) {
            let max = self.remaining.min(usize::MAX as u64) as usize;
            match handler.on_direct(SourceKind::File, self.file.as_raw_fd() as RawFd, max) {
                DirectResult::Transferred(n) => {
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.done = true;
                        handler.on_eof();
                    }
                    return;
                }
                DirectResult::Eof => {
                    self.done = true;
                    handler.on_eof();
                    return;
                }
                DirectResult::Errno(e) => {
                    self.done = true;
                    handler.on_error(BengError::Socket(SocketKind::Io(std::io::Error::from_raw_os_error(e))));
                    return;
                }
                DirectResult::Closed => {
                    self.done = true;
                    return;
                }
                DirectResult::Blocking => {}
            }
        }

        let want = (self.remaining.min(CHUNK as u64)) as usize;
        let mut buf = vec![0u8; want];
        match self.file.read(&mut buf) {
            Ok(0) => {
                self.done = true;
                handler.on_eof();
            }
            Ok(n) => {
                let consumed = handler.on_data(&buf[..n]).min(n);
                if consumed < n {
                    let back = (n - consumed) as i64;
                    let _ = self.file.seek(SeekFrom::Current(-back));
                }
                self.remaining -= consumed as u64;
                if self.remaining == 0 {
                    self.done = true;
                    handler.on_eof();
                }
            }
            Err(e) => {
                self.done = true;
                handler.on_error(BengError::Socket(SocketKind::Io(e)));
            }
        }
    }

    fn skip(&mut self, n: u64) -> SkipResult {
        let n = n.min(self.remaining);
        if self.file.seek(SeekFrom::Current(n as i64)).is_err() {
            return SkipResult::Unsupported;
        }
        self.remaining -= n;
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
    use std::io::Write;

    fn tmp_file(contents: &[u8]) -> File {
        let mut f = tempfile_like();
        f.write_all(contents).unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        f
    }

    // Avoids a `tempfile` dependency: an unlinked O_TMPFILE-less fallback
    // using `File::create` over a unique path in std::env::temp_dir.
    fn tempfile_like() -> File {
        let path = std::env::temp_dir().join(format!("beng-stream-test-{}", std::process::id()));
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .unwrap()
    }

    #[test]
    fn reads_a_byte_range() {
        let f = tmp_file(b"0123456789");
        let mut s = FileStream::new_range(f, 2, 5).unwrap();
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"23456");
        assert!(h.eof);
    }

    #[test]
    fn whole_file_reads_everything() {
        let f = tmp_file(b"hello");
        let mut s = FileStream::whole_file(f).unwrap();
        let h = drain(&mut s, 8);
        assert_eq!(h.data, b"hello");
    }
}
