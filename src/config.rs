//! Configuration surface.
//!
//! The layer consumes configuration, it does not own it: the host
//! application deserializes these structs from its own config source and
//! hands them to the constructors. Presence of remote-store connection
//! config selects the remote backend as the default; otherwise the
//! in-process backend is used.

use crate::constants::{
    DEFAULT_KEY_PREFIX, DEFAULT_TTL_MS, FLAG_DEFINITION_TTL_MS, SWEEP_EVERY_N_INSERTS,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the caching layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CacheLayerConfig {
    pub cache: CacheConfig,
    pub flags: FlagConfig,
    pub rate_limit: RateLimitConfig,
}

/// Cache backend selection and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CacheConfig {
    /// Default backend: "memory" (aliases "in-memory") or "redis".
    pub backend: String,

    /// TTL applied when a write supplies none.
    pub default_ttl_ms: i64,

    /// In-process backend tuning.
    pub memory: MemoryConfig,

    /// Remote store connection; required when `backend` is "redis".
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            default_ttl_ms: DEFAULT_TTL_MS,
            memory: MemoryConfig::default(),
            redis: None,
        }
    }
}

/// In-process backend tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Sweep expired entries on every Nth insert.
    pub sweep_every_inserts: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sweep_every_inserts: SWEEP_EVERY_N_INSERTS,
        }
    }
}

/// Remote store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,

    /// Namespace prefix applied to every stored key.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Feature-flag evaluator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FlagConfig {
    /// How long fetched flag definitions stay cached before re-fetch.
    pub definition_ttl_ms: i64,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            definition_ttl_ms: FLAG_DEFINITION_TTL_MS,
        }
    }
}

/// Rate-limiter defaults consumed by request middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 120,
            window_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheLayerConfig::default();
        assert_eq!(config.cache.backend, "memory");
        assert_eq!(config.cache.default_ttl_ms, DEFAULT_TTL_MS);
        assert!(config.cache.redis.is_none());
        assert_eq!(config.flags.definition_ttl_ms, FLAG_DEFINITION_TTL_MS);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: CacheLayerConfig = serde_json::from_str(
            r#"{
                "cache": {
                    "backend": "redis",
                    "redis": { "url": "redis://cache.internal:6379" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, "redis");
        let redis = config.cache.redis.unwrap();
        assert_eq!(redis.url, "redis://cache.internal:6379");
        assert_eq!(redis.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.rate_limit.max_requests, 120);
    }
}
