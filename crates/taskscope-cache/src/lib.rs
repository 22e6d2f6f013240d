//! taskscope Cache
//!
//! Stores classifications keyed by `owner/name`. Entries are written once and
//! live until an explicit bulk purge; there is no TTL and no eviction policy.
//!
//! Backends:
//! - [`MemoryCache`]: process-local map, for development and tests
//! - [`SqliteCache`]: durable `model_classifications` table

pub mod cache;
pub mod memory;
pub mod sqlite;

pub use cache::{CacheStats, ClassificationCache, DEFAULT_PURGE_PAGE_SIZE};
pub use memory::MemoryCache;
pub use sqlite::{SqliteCache, SqliteCacheConfig};
