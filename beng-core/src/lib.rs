pub mod address;
pub mod cache_item;
pub mod config;
pub mod error;
pub mod http;
pub mod transformation;
pub mod translation;

pub use address::{AddressKind, ResourceAddress};
pub use cache_item::{CacheItem, CacheKey};
pub use config::BengConfig;
pub use error::BengError;
pub use http::{HeaderMap, HttpRequest, HttpResponse, Method};
pub use transformation::{Transformation, TransformationChain};
pub use translation::{ForwardMode, HeaderForwardingPolicy, HeaderGroup, TranslationResponse};
