use beng_core::BengError;
use std::os::unix::io::RawFd;

/// A stream's declared length (§3): exact, a lower-bound estimate, or
/// unknown (e.g. a pipe from a process whose output size isn't known).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Unknown,
    Estimate(u64),
    Exact(u64),
}

/// Zero-copy source kinds a stream may expose via `on_direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Pipe,
    Socket,
}

/// Bitmask of accepted/offered [`SourceKind`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceKindMask(u8);

impl SourceKindMask {
    pub const NONE: Self = Self(0);

    pub fn of(kind: SourceKind) -> Self {
        Self(1 << (kind as u8))
    }

    pub fn any_of(kinds: &[SourceKind]) -> Self {
        kinds.iter().fold(Self::NONE, |acc, k| acc.union(Self::of(*k)))
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.0 & (1 << (kind as u8)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Result of an `on_direct` splice attempt.
#[derive(Debug)]
pub enum DirectResult {
    Transferred(usize),
    Blocking,
    Closed,
    Eof,
    Errno(i32),
}

/// Result of a `skip(n)` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipResult {
    Skipped(u64),
    Unsupported,
}

/// The consumer side of a stream. At most one `on_data`/`on_direct` is ever
/// in flight (§4.1 invariant); a handler expresses back-pressure by
/// returning fewer bytes consumed than it was offered.
pub trait StreamHandler {
    /// Returns the number of bytes consumed (`<= buf.len()`).
    fn on_data(&mut self, buf: &[u8]) -> usize;

    fn on_direct(&mut self, _kind: SourceKind, _fd: RawFd, _max: usize) -> DirectResult {
        DirectResult::Blocking
    }

    fn on_eof(&mut self) {}

    fn on_error(&mut self, _err: BengError) {}

    /// Non-empty mask opts into `on_direct` delivery for these source kinds.
    fn accepted_source_kinds(&self) -> SourceKindMask {
        SourceKindMask::NONE
    }
}

/// A finite or indefinite, asynchronously-produced byte sequence (§3, §4.1).
///
/// Exactly one producer and at most one consumer. After a terminal
/// callback (`on_eof`/`on_error`) fires, the stream is considered
/// destroyed and must not be read again.
pub trait ByteStream {
    fn declared_length(&self) -> Length {
        Length::Unknown
    }

    fn source_kinds(&self) -> SourceKindMask {
        SourceKindMask::NONE
    }

    /// Deliver zero or more `on_data`/`on_direct` callbacks to `handler`,
    /// optionally followed by a terminal callback.
    fn read(&mut self, handler: &mut dyn StreamHandler);

    /// Advance past `n` bytes without materializing them, if supported.
    fn skip(&mut self, _n: u64) -> SkipResult {
        SkipResult::Unsupported
    }

    /// Close before a terminal callback fires. Idempotent; cascades to the
    /// stream's own source (§4.1 cancellation rule), except for `hold` and
    /// `tee` which decrement a reference count instead.
    fn close(&mut self);
}

/// Test/driver helper: pulls a stream to completion, collecting all
/// delivered bytes. Used throughout this crate's unit tests and by
/// higher-level crates that need to materialize a small stream.
#[derive(Default)]
pub struct CollectHandler {
    pub data: Vec<u8>,
    pub eof: bool,
    pub error: Option<BengError>,
}

impl StreamHandler for CollectHandler {
    fn on_data(&mut self, buf: &[u8]) -> usize {
        self.data.extend_from_slice(buf);
        buf.len()
    }

    fn on_eof(&mut self) {
        self.eof = true;
    }

    fn on_error(&mut self, err: BengError) {
        self.error = Some(err);
    }
}

/// Drive `stream` until a terminal callback fires (bounded by `max_steps`
/// to avoid a runaway loop on a buggy infinite stream).
pub fn drain(stream: &mut dyn ByteStream, max_steps: usize) -> CollectHandler {
    let mut handler = CollectHandler::default();
    for _ in 0..max_steps {
        if handler.eof || handler.error.is_some() {
            break;
        }
        stream.read(&mut handler);
    }
    handler
}
