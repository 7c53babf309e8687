pub mod revalidate;
pub mod rubber;
pub mod singleflight;
pub mod store;

pub use revalidate::{classify, conditional_headers, merge_not_modified_headers, RevalidationOutcome};
pub use rubber::{Rubber, RubberHandle};
pub use singleflight::SingleFlight;
pub use store::{CacheStore, MemcachedClient, MemcachedStore, RubberStore};
