//! In-process cache primitives.
//!
//! - [`BoundedCache`] - fixed-capacity LRU map
//! - [`CacheEntry`] - value wrapper carrying creation and expiry instants

pub mod bounded;
pub mod entry;

pub use bounded::{BoundedCache, BoundedCacheStats};
pub use entry::CacheEntry;
