/// An append-only buffer that grows in fixed-size segments rather than by
/// doubling/reallocating a single `Vec`, so pointers into earlier segments
/// stay stable while later segments are appended (used by `tee` and by the
/// HTTP framing layer's header accumulator).
pub struct GrowingBuffer {
    segment_size: usize,
    segments: Vec<Vec<u8>>,
    len: usize,
}

impl GrowingBuffer {
    pub fn new(segment_size: usize) -> Self {
        Self {
            segment_size: segment_size.max(1),
            segments: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, data: &[u8]) {
        let mut remaining = data;
        while !remaining.is_empty() {
            let last_has_room = self
                .segments
                .last()
                .map(|s| s.len() < self.segment_size)
                .unwrap_or(false);
            if !last_has_room {
                self.segments.push(Vec::with_capacity(self.segment_size));
            }
            let seg = self.segments.last_mut().unwrap();
            let room = self.segment_size - seg.len();
            let take = room.min(remaining.len());
            seg.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            self.len += take;
        }
    }

    /// Materializes the whole buffer contiguously.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for s in &self.segments {
            out.extend_from_slice(s);
        }
        out
    }

    /// Drops the first `n` bytes from the front; `n` must not exceed `len()`.
    pub fn consume(&mut self, mut n: usize) {
        assert!(n <= self.len);
        self.len -= n;
        while n > 0 {
            let front = &mut self.segments[0];
            if n >= front.len() {
                n -= front.len();
                self.segments.remove(0);
            } else {
                front.drain(0..n);
                n = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_across_segment_boundaries() {
        let mut b = GrowingBuffer::new(4);
        b.append(b"ab");
        b.append(b"cdef");
        b.append(b"g");
        assert_eq!(b.len(), 7);
        assert_eq!(b.to_vec(), b"abcdefg");
    }

    #[test]
    fn consume_trims_the_front() {
        let mut b = GrowingBuffer::new(4);
        b.append(b"abcdefgh");
        b.consume(5);
        assert_eq!(b.to_vec(), b"fgh");
        assert_eq!(b.len(), 3);
    }
}
