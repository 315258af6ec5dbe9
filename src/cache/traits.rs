//! Cache backend interface.
//!
//! Implemented identically by the in-process and remote backends. The
//! read/write surface is fail-open: a malfunctioning backend degrades to
//! "always recompute" (misses and no-ops), never to an error and never to
//! wrong data. Internal failures are logged and counted in the backend's
//! `errors` stat. Construction is the only fallible phase.

use super::entry::CacheOptions;
use super::stats::CacheStatsSnapshot;
use async_trait::async_trait;

/// Uniform contract over a key/value store holding [`super::CacheEntry`]s.
///
/// Values cross this boundary already serialized; the manager owns typed
/// encode/decode.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short stable name, used for routing and logging.
    fn backend_name(&self) -> &'static str;

    /// Whether state is shared across process instances.
    fn is_distributed(&self) -> bool;

    /// Whether the backend maintains a native tag index. Backends without
    /// one are invalidated by key-pattern matching instead.
    fn supports_tag_index(&self) -> bool;

    /// Return the payload for `key` if present and unexpired. A stale entry
    /// is physically removed as a side effect and counted as a miss.
    async fn get(&self, key: &str) -> Option<String>;

    /// Insert or replace an entry. Overwriting replaces the key's tag
    /// associations completely.
    async fn set(&self, key: &str, value: &str, options: &CacheOptions);

    /// Remove an entry; `true` iff one existed.
    async fn delete(&self, key: &str) -> bool;

    /// Remove all entries (no pattern) or all whose key matches the regex
    /// pattern. Returns the number removed.
    async fn clear(&self, pattern: Option<&str>) -> u64;

    /// Same expiry semantics as `get`, without touching the payload or the
    /// hit counter.
    async fn exists(&self, key: &str) -> bool;

    /// Keys of live entries, optionally filtered by a regex pattern.
    async fn keys(&self, pattern: Option<&str>) -> Vec<String>;

    /// Keys currently recorded under `tag`. Empty when the backend has no
    /// tag index. Membership may be stale; entry-level TTL stays
    /// authoritative.
    async fn tag_members(&self, tag: &str) -> Vec<String>;

    /// Drop the index record for `tag`; `true` iff one existed.
    async fn delete_tag_index(&self, tag: &str) -> bool;

    /// Cumulative lifetime counters plus current population.
    async fn stats(&self) -> CacheStatsSnapshot;

    /// Whether the backing store is reachable. In-process backends are
    /// always healthy.
    async fn health_check(&self) -> bool;
}
