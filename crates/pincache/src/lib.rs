//! # pincache
//!
//! Capacity-bounded LRU cache with pinning and merge support.
//!
//! ## Architecture
//! - **Index**: AHash map from key to slot handle (O(1))
//! - **Recency list**: unpinned entries, MRU at the head, evicted from the tail
//! - **Pinned set**: entries exempt from eviction, kept in pin order
//! - **SharedCache**: `RwLock` handle for callers on several threads
//!
//! ```
//! use pincache::{PutOutcome, StringLru};
//!
//! let mut cache = StringLru::new(2);
//! cache.put("x".to_string(), 1);
//! cache.put("y".to_string(), 2);
//! cache.pin("x");
//!
//! assert_eq!(cache.put("z".to_string(), 3), PutOutcome::Inserted);
//! assert_eq!(cache.get("x"), Some(1));
//! assert_eq!(cache.get("y"), None);
//! ```

#![warn(missing_docs)]

mod arena;
mod cache;
mod config;
mod error;
mod lru;
mod stats;

pub use cache::SharedCache;
pub use config::{CacheConfig, DEFAULT_CAPACITY};
pub use error::{Error, Result};
pub use lru::{PinnedLru, PutOutcome};
pub use stats::{CacheStats, StatsSnapshot};

/// String-keyed cache of integer values
pub type StringLru = PinnedLru<String, i64>;

/// Shared handle to a [`StringLru`]
pub type StringCache = SharedCache<String, i64>;
