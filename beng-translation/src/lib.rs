pub mod cache;
pub mod client;
pub mod protocol;
pub mod request;
pub mod response;

pub use cache::{TranslationCache, TranslationCacheKey};
pub use client::TranslationClient;
pub use protocol::{decode, encode, Command, Packet};
pub use request::TranslateRequest;
pub use response::decode_response;
