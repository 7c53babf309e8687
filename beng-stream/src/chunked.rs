use beng_core::error::{BengError, FramingKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecState {
    Size,
    SizeExt,
    SizeCr,
    Data,
    DataCr,
    DataLf,
    Trailer,
    Done,
}

/// Decodes HTTP/1.1 chunked transfer coding (§4.1, §4.3). In `verbatim`
/// mode the chunk envelope itself is preserved byte-for-byte in `output`
/// rather than stripped, for the pass-through "verbatim chunked" case
/// where an upstream's chunking is relayed unchanged.
pub struct ChunkedDecoder {
    state: DecState,
    chunk_remaining: u64,
    size_acc: u64,
    verbatim: bool,
    pub output: Vec<u8>,
    pub ended: bool,
}

impl ChunkedDecoder {
    pub fn new(verbatim: bool) -> Self {
        Self {
            state: DecState::Size,
            chunk_remaining: 0,
            size_acc: 0,
            verbatim,
            output: Vec::new(),
            ended: false,
        }
    }

    /// Feeds more raw bytes, appending decoded body bytes (or, in verbatim
    /// mode, the untouched envelope bytes) to `self.output`. Returns the
    /// number of input bytes consumed.
    pub fn feed(&mut self, input: &[u8]) -> Result<usize, BengError> {
        let mut i = 0;
        while i < input.len() && self.state != DecState::Done {
            let b = input[i];
            match self.state {
                DecState::Size => {
                    if b == b'\r' {
                        self.state = DecState::SizeCr;
                    } else if b == b';' {
                        self.state = DecState::SizeExt;
                    } else {
                        let d = (b as char)
                            .to_digit(16)
                            .ok_or(FramingKind::InvalidContentLength)?;
                        self.size_acc = self
                            .size_acc
                            .checked_mul(16)
                            .and_then(|v| v.checked_add(d as u64))
                            .ok_or(FramingKind::InvalidContentLength)?;
                    }
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                }
                DecState::SizeExt => {
                    if b == b'\r' {
                        self.state = DecState::SizeCr;
                    }
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                }
                DecState::SizeCr => {
                    if b != b'\n' {
                        return Err(FramingKind::MalformedStatusLine.into());
                    }
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                    if self.size_acc == 0 {
                        self.state = DecState::Trailer;
                    } else {
                        self.chunk_remaining = self.size_acc;
                        self.state = DecState::Data;
                    }
                    self.size_acc = 0;
                }
                DecState::Data => {
                    let take = (input.len() - i).min(self.chunk_remaining as usize);
                    self.output.extend_from_slice(&input[i..i + take]);
                    i += take;
                    self.chunk_remaining -= take as u64;
                    if self.chunk_remaining == 0 {
                        self.state = DecState::DataCr;
                    }
                }
                DecState::DataCr => {
                    if b != b'\r' {
                        return Err(FramingKind::PrematureEof.into());
                    }
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                    self.state = DecState::DataLf;
                }
                DecState::DataLf => {
                    if b != b'\n' {
                        return Err(FramingKind::PrematureEof.into());
                    }
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                    self.state = DecState::Size;
                }
                DecState::Trailer => {
                    // No trailer-header support: the terminating CRLF after
                    // the final zero-size chunk ends the stream.
                    if self.verbatim {
                        self.output.push(b);
                    }
                    i += 1;
                    if b == b'\n' {
                        self.state = DecState::Done;
                        self.ended = true;
                    }
                }
                DecState::Done => unreachable!(),
            }
        }
        Ok(i)
    }
}

/// Frames `data` as a single chunk followed by the terminating zero-chunk.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn encode_final() -> Vec<u8> {
    b"0\r\n\r\n".to_vec()
}

/// Encodes the whole of `data` as chunked transfer coding in one call.
pub fn encode_chunked(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if !data.is_empty() {
        out.extend(encode_chunk(data));
    }
    out.extend(encode_final());
    out
}

/// Decodes a complete chunked byte stream in one call; fails if the input
/// doesn't end cleanly with the terminating chunk.
pub fn decode_chunked_all(input: &[u8]) -> Result<Vec<u8>, BengError> {
    let mut dec = ChunkedDecoder::new(false);
    let consumed = dec.feed(input)?;
    if !dec.ended || consumed != input.len() {
        return Err(FramingKind::PrematureEof.into());
    }
    Ok(dec.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bodies() {
        for sample in [&b""[..], &b"foo"[..], &b"hello world, this is a body"[..]] {
            let encoded = encode_chunked(sample);
            let decoded = decode_chunked_all(&encoded).unwrap();
            assert_eq!(decoded, sample);
        }
    }

    #[test]
    fn matches_the_canonical_three_byte_chunk_wire_form() {
        assert_eq!(encode_chunked(b"foo"), b"3\r\nfoo\r\n0\r\n\r\n");
    }

    #[test]
    fn verbatim_mode_preserves_the_envelope_byte_for_byte() {
        let wire = b"3\r\nfoo\r\n0\r\n\r\n";
        let mut dec = ChunkedDecoder::new(true);
        let consumed = dec.feed(wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert!(dec.ended);
        assert_eq!(dec.output, wire);
    }

    #[test]
    fn rejects_a_non_hex_chunk_size() {
        let mut dec = ChunkedDecoder::new(false);
        assert!(dec.feed(b"zz\r\n").is_err());
    }

    #[test]
    fn feed_can_be_called_incrementally() {
        let wire = encode_chunked(b"incremental");
        let mut dec = ChunkedDecoder::new(false);
        for byte in &wire {
            dec.feed(std::slice::from_ref(byte)).unwrap();
        }
        assert!(dec.ended);
        assert_eq!(dec.output, b"incremental");
    }
}
