pub mod autopipe;
pub mod cat;
pub mod chunked;
mod core;
pub mod delayed;
pub mod drip;
pub mod file;
pub mod growing_buffer;
pub mod head;
pub mod hold;
pub mod memory;
pub mod null;
pub mod sink;
pub mod tee;
pub mod zero;

pub use crate::core::{
    drain, ByteStream, CollectHandler, DirectResult, Length, SkipResult, SourceKind,
    SourceKindMask, StreamHandler,
};
pub use autopipe::AutoPipeStream;
pub use cat::CatStream;
pub use chunked::{decode_chunked_all, encode_chunk, encode_chunked, encode_final, ChunkedDecoder};
pub use delayed::DelayedStream;
pub use drip::ByteDripStream;
pub use file::FileStream;
pub use growing_buffer::GrowingBuffer;
pub use head::HeadStream;
pub use hold::HoldStream;
pub use memory::{string_stream, MemoryStream};
pub use null::NullStream;
pub use sink::{MemorySink, NullSink, RubberAllocator, RubberSink};
pub use tee::{tee, TeeBranch};
pub use zero::ZeroStream;
