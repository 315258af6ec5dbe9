//! Caching layer: pluggable backends behind a uniform async interface.
//!
//! The [`CacheManager`] is the entry point. It routes typed reads and
//! writes to named [`CacheBackend`] implementations, replicates writes on
//! request, invalidates entries in bulk by tag, and layers read-through
//! (`get_or_set`) and memoization on top of the backend primitives.
//!
//! Every backend is fail-open: an unavailable or misbehaving store degrades
//! to cache misses and skipped writes with a warning, never an error at the
//! call site. Logical expiry (`now - created_at > ttl_ms`, tracked per
//! entry) is authoritative over whatever expiry the physical store applies.

pub mod backends;
pub mod entry;
pub mod errors;
pub mod manager;
pub mod stats;
pub mod traits;

pub use backends::MemoryBackend;
pub use entry::{CacheEntry, CacheOptions};
pub use errors::{CacheError, CacheResult};
pub use manager::{CacheManager, Memoized};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use traits::CacheBackend;

#[cfg(feature = "cache-redis")]
pub use backends::RedisBackend;
