//! In-process cache backend.
//!
//! A process-local map holding entries directly, with lazy TTL eviction on
//! read and an opportunistic sweep every Nth insert to bound growth from
//! entries that are never read again. Maintains a native tag index so
//! grouped invalidation removes exactly the tagged entries.
//!
//! This backend has no cross-process visibility. Use it standalone for
//! single-instance deployments, or as a non-shared local tier underneath
//! the remote backend.

use crate::cache::entry::{decode_payload, encode_payload, CacheEntry, CacheOptions};
use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::cache::traits::CacheBackend;
use crate::clock::Clock;
use crate::config::MemoryConfig;
use crate::constants::{DEFAULT_TTL_MS, SWEEP_EVERY_N_INSERTS};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Process-local cache backend with per-entry TTL and tag indexing.
pub struct MemoryBackend {
    entries: DashMap<String, CacheEntry>,
    tag_index: DashMap<String, HashSet<String>>,
    stats: CacheStats,
    clock: Arc<dyn Clock>,
    inserts: AtomicU64,
    sweep_every: u64,
    default_ttl_ms: i64,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.entries.len())
            .field("tags", &self.tag_index.len())
            .field("sweep_every", &self.sweep_every)
            .finish()
    }
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            tag_index: DashMap::new(),
            stats: CacheStats::default(),
            clock,
            inserts: AtomicU64::new(0),
            sweep_every: SWEEP_EVERY_N_INSERTS,
            default_ttl_ms: DEFAULT_TTL_MS,
        }
    }

    pub fn from_config(config: &MemoryConfig, default_ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        let mut backend = Self::new(clock);
        backend.sweep_every = config.sweep_every_inserts.max(1);
        backend.default_ttl_ms = default_ttl_ms;
        backend
    }

    /// Remove every expired entry. Runs opportunistically on inserts and is
    /// also callable directly.
    pub fn sweep(&self) {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0u64;
        for key in expired {
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.detach_tags(&key, &entry.tags);
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats.record_evictions(removed);
            debug!(removed = removed, "Swept expired cache entries");
        }
    }

    /// Remove an entry that turned out to be expired, counting the
    /// eviction.
    fn evict(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.detach_tags(key, &entry.tags);
            self.stats.record_eviction();
        }
    }

    fn attach_tags(&self, key: &str, tags: &[String]) {
        for tag in tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn detach_tags(&self, key: &str, tags: &[String]) {
        for tag in tags {
            let emptied = self
                .tag_index
                .get_mut(tag)
                .map(|mut members| {
                    members.remove(key);
                    members.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                self.tag_index.remove(tag);
            }
        }
    }

    fn compile_pattern(&self, pattern: &str) -> Option<Regex> {
        match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = pattern, error = %e, "Invalid key pattern, treating as no match");
                self.stats.record_error();
                None
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }

    fn supports_tag_index(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();

        let entry = match self.entries.get_mut(key) {
            Some(mut guard) => {
                if guard.is_expired(now) {
                    drop(guard);
                    self.evict(key);
                    self.stats.record_miss();
                    debug!(key = key, "Cache MISS (memory, expired)");
                    return None;
                }
                guard.hit_count += 1;
                guard.clone()
            }
            None => {
                self.stats.record_miss();
                debug!(key = key, "Cache MISS (memory)");
                return None;
            }
        };

        match decode_payload(&entry) {
            Ok(payload) => {
                self.stats.record_hit();
                debug!(key = key, "Cache HIT (memory)");
                Some(payload)
            }
            Err(e) => {
                // A payload that cannot decode will never decode; drop it.
                warn!(key = key, error = %e, "Failed to decode cached payload, discarding entry");
                self.stats.record_error();
                self.evict(key);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, options: &CacheOptions) {
        let (data, compressed) = match encode_payload(value, options.compress) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to encode payload, skipping cache write");
                self.stats.record_error();
                return;
            }
        };

        let ttl_ms = options.ttl_ms.unwrap_or(self.default_ttl_ms);
        let entry = CacheEntry::new(data, compressed, self.clock.now_ms(), ttl_ms, options);
        let new_tags = entry.tags.clone();

        // Overwrites replace tag associations completely.
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            self.detach_tags(key, &previous.tags);
        }
        self.attach_tags(key, &new_tags);

        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts % self.sweep_every == 0 {
            self.sweep();
        }

        debug!(key = key, tags = new_tags.len(), "Cache SET (memory)");
    }

    async fn delete(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.detach_tags(key, &entry.tags);
                debug!(key = key, "Cache DEL (memory)");
                true
            }
            None => false,
        }
    }

    async fn clear(&self, pattern: Option<&str>) -> u64 {
        match pattern {
            None => {
                let removed = self.entries.len() as u64;
                self.entries.clear();
                self.tag_index.clear();
                debug!(removed = removed, "Cache CLEAR (memory)");
                removed
            }
            Some(pattern) => {
                let Some(re) = self.compile_pattern(pattern) else {
                    return 0;
                };

                let matching: Vec<String> = self
                    .entries
                    .iter()
                    .filter(|e| re.is_match(e.key()))
                    .map(|e| e.key().clone())
                    .collect();

                let mut removed = 0u64;
                for key in matching {
                    if let Some((_, entry)) = self.entries.remove(&key) {
                        self.detach_tags(&key, &entry.tags);
                        removed += 1;
                    }
                }
                debug!(pattern = pattern, removed = removed, "Cache pattern CLEAR (memory)");
                removed
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            Some(guard) => guard.is_expired(now),
            None => return false,
        };

        if expired {
            self.evict(key);
            return false;
        }
        true
    }

    async fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        let now = self.clock.now_ms();
        let re = match pattern {
            Some(p) => match self.compile_pattern(p) {
                Some(re) => Some(re),
                None => return Vec::new(),
            },
            None => None,
        };

        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .filter(|e| re.as_ref().is_none_or(|re| re.is_match(e.key())))
            .map(|e| e.key().clone())
            .collect()
    }

    async fn tag_members(&self, tag: &str) -> Vec<String> {
        self.tag_index
            .get(tag)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn delete_tag_index(&self, tag: &str) -> bool {
        self.tag_index.remove(tag).is_some()
    }

    async fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.entries.len())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
