#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Quarry Cache
//!
//! Caching, feature-gating, and request-throttling layer for data-dashboard
//! services that sit in front of an analytical warehouse.
//!
//! ## Overview
//!
//! Warehouse queries are expensive and their results change slowly, so the
//! serving layer caches aggressively and degrades gracefully: every cache
//! operation is **fail-open** — a broken or unreachable backing store shows
//! up as cache misses and log warnings, never as errors at the call site.
//!
//! ## Architecture
//!
//! - [`cache`] - Pluggable backend abstraction ([`CacheBackend`]) with an
//!   in-process [`MemoryBackend`] and an optional Redis backend (feature
//!   `cache-redis`, on by default), orchestrated by the [`CacheManager`]:
//!   typed get/set, TTL with logical expiry, tag-based bulk invalidation,
//!   replication, read-through `get_or_set`, and memoization.
//! - [`flags`] - [`FeatureFlags`] evaluates percentage rollouts, role
//!   segments, and date windows against a per-request context, with sticky
//!   user bucketing and a provider/defaults fallback chain.
//! - [`rate_limit`] - [`RateLimiter`], a process-local fixed-window counter
//!   consulted by request middleware.
//! - [`clock`] - Injectable time source so expiry and windows are testable
//!   under a simulated clock.
//! - [`config`] - Serde-deserializable configuration consumed by the
//!   constructors; Redis failures at startup fall back to the in-process
//!   backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry_cache::cache::{CacheManager, CacheOptions};
//! use quarry_cache::clock::SystemClock;
//! use quarry_cache::config::CacheConfig;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let manager = CacheManager::from_config(&CacheConfig::default(), Arc::new(SystemClock)).await;
//!
//! let report: Result<Vec<i64>, std::io::Error> = manager
//!     .get_or_set(
//!         "q:revenue:30d",
//!         || async { Ok(vec![1, 2, 3]) },
//!         &CacheOptions::ttl(60_000).with_tags(["table:payments"]),
//!     )
//!     .await;
//!
//! // A payments-table write invalidates every dependent query at once.
//! manager.invalidate_by_tags(&["table:payments"], None).await;
//! # let _ = report;
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod flags;
pub mod rate_limit;

pub use cache::{CacheBackend, CacheEntry, CacheManager, CacheOptions, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheLayerConfig;
pub use flags::{EvalContext, FeatureFlags, FlagDefinition, FlagProvider};
pub use rate_limit::{RateLimitDecision, RateLimiter};

#[cfg(feature = "cache-redis")]
pub use cache::RedisBackend;
