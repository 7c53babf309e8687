pub mod buffer_pool;
pub mod http1;
pub mod serialize;
pub mod socket;

pub use buffer_pool::{SlabHandle, SlabPool};
pub use http1::{
    expects_100_continue, parse_request_head, parse_response_head, resolve_body_length,
    BodyLength, ParsedRequestHead, ParsedResponseHead,
};
pub use serialize::{response_head_bytes, serialize_request_head, serialize_response_head};
pub use socket::{BufferedSocket, SocketState};
