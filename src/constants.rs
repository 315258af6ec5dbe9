//! Operational defaults shared across the caching layer.

/// Default entry time-to-live when a write supplies none (5 minutes).
pub const DEFAULT_TTL_MS: i64 = 300_000;

/// How long a fetched feature-flag definition stays valid before it is
/// re-fetched from the provider (5 minutes).
pub const FLAG_DEFINITION_TTL_MS: i64 = 300_000;

/// The in-process backend sweeps expired entries opportunistically on
/// every Nth insert.
pub const SWEEP_EVERY_N_INSERTS: u64 = 64;

/// Namespace prefix applied to every key the remote backend writes, so a
/// shared store can host other tenants without collisions.
pub const DEFAULT_KEY_PREFIX: &str = "qc:";

/// Prefix (under the key namespace) for tag-index keys on the remote backend.
pub const TAG_INDEX_PREFIX: &str = "tag:";

/// Batch size for remote SCAN iterations.
pub const SCAN_BATCH_SIZE: usize = 100;
