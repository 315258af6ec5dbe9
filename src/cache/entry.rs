//! Cache entry model and write options.
//!
//! A [`CacheEntry`] wraps the serialized payload with the metadata every
//! backend needs: creation instant, time-to-live, invalidation tags, an
//! opaque version marker, and a hit counter. Logical expiry
//! (`now - created_at > ttl_ms`) is authoritative everywhere, even when the
//! physical store also expires keys on its own schedule.

use super::errors::{CacheError, CacheResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// A stored value plus its expiry and grouping metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized payload (base64-wrapped gzip when `compressed` is set).
    pub data: String,
    /// Epoch milliseconds at which the entry was written.
    pub created_at: i64,
    /// Time-to-live in milliseconds.
    pub ttl_ms: i64,
    /// Tags for grouped invalidation.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque version marker supplied by the writer.
    #[serde(default)]
    pub version: Option<String>,
    /// Whether `data` is compressed.
    #[serde(default)]
    pub compressed: bool,
    /// Successful reads served from this entry.
    #[serde(default)]
    pub hit_count: u64,
}

impl CacheEntry {
    /// Build an entry from an already-encoded payload. `ttl_ms` is the
    /// resolved TTL: the write option when supplied, else the backend's
    /// default.
    pub fn new(data: String, compressed: bool, now_ms: i64, ttl_ms: i64, options: &CacheOptions) -> Self {
        Self {
            data,
            created_at: now_ms,
            ttl_ms,
            tags: options.tags.clone(),
            version: options.version.clone(),
            compressed,
            hit_count: 0,
        }
    }

    /// An entry is logically absent once its TTL has elapsed, regardless of
    /// whether the physical backend has evicted it yet.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.created_at > self.ttl_ms
    }

    /// Epoch milliseconds at which the entry stops being served.
    pub fn expires_at(&self) -> i64 {
        self.created_at + self.ttl_ms
    }
}

/// Write options for `set` and `get_or_set`.
///
/// Explicit struct with documented defaults: no TTL means the backend's
/// configured default, no tags, no compression, no version, the manager's
/// default backend, no replication.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Entry time-to-live in milliseconds.
    pub ttl_ms: Option<i64>,
    /// Tags attached to the entry for grouped invalidation.
    pub tags: Vec<String>,
    /// Compress the serialized payload before storing.
    pub compress: bool,
    /// Opaque version marker stored alongside the payload.
    pub version: Option<String>,
    /// Named backend to route the write to (manager-level option).
    pub backend: Option<String>,
    /// Write to every registered backend, best-effort (manager-level option).
    pub replicate: bool,
}

impl CacheOptions {
    /// Options with the given TTL and everything else defaulted.
    pub fn ttl(ttl_ms: i64) -> Self {
        Self {
            ttl_ms: Some(ttl_ms),
            ..Self::default()
        }
    }

    /// Attach invalidation tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Compress the payload before storing.
    pub fn with_compression(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Stamp the entry with a version marker.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Route the write to a named backend.
    pub fn on_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Replicate the write to every registered backend.
    pub fn replicated(mut self) -> Self {
        self.replicate = true;
        self
    }
}

/// Encode a serialized payload for storage, compressing when requested.
///
/// Returns the stored text and whether compression was actually applied.
pub(crate) fn encode_payload(value: &str, compress: bool) -> CacheResult<(String, bool)> {
    if !compress {
        return Ok((value.to_string(), false));
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(value.as_bytes())
        .and_then(|()| encoder.finish())
        .map(|bytes| (BASE64.encode(bytes), true))
        .map_err(|e| CacheError::SerializationError(format!("gzip encode failed: {e}")))
}

/// Recover the serialized payload from a stored entry.
pub(crate) fn decode_payload(entry: &CacheEntry) -> CacheResult<String> {
    if !entry.compressed {
        return Ok(entry.data.clone());
    }

    let bytes = BASE64
        .decode(&entry.data)
        .map_err(|e| CacheError::SerializationError(format!("base64 decode failed: {e}")))?;

    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| CacheError::SerializationError(format!("gzip decode failed: {e}")))?;
    Ok(out)
}
