//! Cache manager.
//!
//! Orchestrates one or more named backends: routes typed reads and writes
//! to the default or a named backend, optionally replicates a write to all
//! backends best-effort, implements tag-based bulk invalidation with a
//! per-backend strategy, and offers read-through `get_or_set`/`memoize`
//! conveniences built only on the backend primitives.
//!
//! Managers are constructed explicitly and injected into call sites; there
//! is no ambient singleton.

use super::entry::CacheOptions;
use super::stats::CacheStatsSnapshot;
use super::traits::CacheBackend;
use crate::cache::backends::MemoryBackend;
use crate::clock::Clock;
use crate::config::CacheConfig;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "cache-redis")]
use crate::cache::backends::RedisBackend;

/// Orchestrates a named set of cache backends with a designated default.
pub struct CacheManager {
    backends: HashMap<String, Arc<dyn CacheBackend>>,
    default_backend: String,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("default_backend", &self.default_backend)
            .finish()
    }
}

impl CacheManager {
    /// Create a manager with a single backend, which becomes the default.
    pub fn new(name: impl Into<String>, backend: Arc<dyn CacheBackend>) -> Self {
        let name = name.into();
        let mut backends: HashMap<String, Arc<dyn CacheBackend>> = HashMap::new();
        backends.insert(name.clone(), backend);
        Self {
            backends,
            default_backend: name,
        }
    }

    /// Register an additional named backend.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Make a previously registered backend the default. Unknown names are
    /// ignored with a warning.
    pub fn set_default(&mut self, name: &str) {
        if self.backends.contains_key(name) {
            self.default_backend = name.to_string();
        } else {
            warn!(backend = name, "Cannot set unknown backend as default");
        }
    }

    /// Build a manager from configuration with graceful degradation.
    ///
    /// The in-process backend is always registered as "memory". When the
    /// configuration selects Redis and a connection can be established, it
    /// is registered as "redis" and becomes the default; when Redis is
    /// configured but unreachable, the manager falls back to the in-process
    /// backend with a warning. Startup never fails for cache reasons.
    pub async fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let memory = Arc::new(MemoryBackend::from_config(
            &config.memory,
            config.default_ttl_ms,
            clock.clone(),
        ));
        let mut manager = Self::new("memory", memory);

        match config.backend.as_str() {
            "redis" => manager.attach_redis(config, clock).await,
            "memory" | "in-memory" => {
                info!(backend = "memory", "Cache manager initialized");
            }
            other => {
                warn!(
                    backend = other,
                    "Unknown cache backend, falling back to in-process"
                );
            }
        }

        manager
    }

    #[cfg(feature = "cache-redis")]
    async fn attach_redis(&mut self, config: &CacheConfig, clock: Arc<dyn Clock>) {
        let Some(redis_config) = &config.redis else {
            warn!("Redis backend selected but no [cache.redis] config found, using in-process");
            return;
        };

        match RedisBackend::from_config(redis_config, config.default_ttl_ms, clock).await {
            Ok(backend) => {
                self.register("redis", Arc::new(backend));
                self.default_backend = "redis".to_string();
                info!(backend = "redis", "Cache manager initialized");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to in-process cache"
                );
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn attach_redis(&mut self, _config: &CacheConfig, _clock: Arc<dyn Clock>) {
        warn!("Redis backend requested but 'cache-redis' feature not enabled, using in-process");
    }

    /// Name of the current default backend.
    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    /// Registered backend names.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Resolve the named backend, falling back to the default (with a
    /// warning) when the name is unknown.
    fn backend(&self, name: Option<&str>) -> &Arc<dyn CacheBackend> {
        match name {
            Some(name) => self.backends.get(name).unwrap_or_else(|| {
                warn!(backend = name, "Unknown cache backend, using default");
                &self.backends[&self.default_backend]
            }),
            None => &self.backends[&self.default_backend],
        }
    }

    /// Typed read from the named or default backend. Deserialization
    /// failures degrade to a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, backend: Option<&str>) -> Option<T> {
        let payload = self.backend(backend).get(key).await?;
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Cached payload failed to deserialize, treating as miss");
                None
            }
        }
    }

    /// Typed write. With `options.replicate` the value is written to every
    /// registered backend independently; one backend failing never affects
    /// the others (and individual backends are already fail-open).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: &CacheOptions) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = key, error = %e, "Value failed to serialize, skipping cache write");
                return;
            }
        };

        if options.replicate {
            join_all(
                self.backends
                    .values()
                    .map(|backend| backend.set(key, &payload, options)),
            )
            .await;
            debug!(key = key, backends = self.backends.len(), "Replicated cache write");
        } else {
            self.backend(options.backend.as_deref())
                .set(key, &payload, options)
                .await;
        }
    }

    /// Remove a key from the named or default backend.
    pub async fn delete(&self, key: &str, backend: Option<&str>) -> bool {
        self.backend(backend).delete(key).await
    }

    /// Clear all entries, or those matching a regex pattern.
    pub async fn clear(&self, pattern: Option<&str>, backend: Option<&str>) -> u64 {
        self.backend(backend).clear(pattern).await
    }

    pub async fn exists(&self, key: &str, backend: Option<&str>) -> bool {
        self.backend(backend).exists(key).await
    }

    pub async fn keys(&self, pattern: Option<&str>, backend: Option<&str>) -> Vec<String> {
        self.backend(backend).keys(pattern).await
    }

    pub async fn stats(&self, backend: Option<&str>) -> CacheStatsSnapshot {
        self.backend(backend).stats().await
    }

    /// Health of every registered backend.
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let mut health = HashMap::new();
        for (name, backend) in &self.backends {
            health.insert(name.clone(), backend.health_check().await);
        }
        health
    }

    /// Remove every entry carrying any of the given tags; returns the
    /// number of entries removed.
    ///
    /// Backends with a native tag index are invalidated precisely: every
    /// member of each tag's index is deleted along with the index record
    /// itself. Index-less backends fall back to a pattern clear using the
    /// tag as the pattern.
    pub async fn invalidate_by_tags(&self, tags: &[&str], backend: Option<&str>) -> u64 {
        let backend = self.backend(backend);
        let mut removed = 0u64;

        for tag in tags {
            if backend.supports_tag_index() {
                for key in backend.tag_members(tag).await {
                    // Stale index membership pointing at an already-expired
                    // key is a no-op here.
                    if backend.delete(&key).await {
                        removed += 1;
                    }
                }
                backend.delete_tag_index(tag).await;
            } else {
                removed += backend.clear(Some(tag)).await;
            }
        }

        debug!(tags = tags.len(), removed = removed, "Invalidated cache entries by tag");
        removed
    }

    /// Read-through: return the cached value for `key`, or invoke `fetcher`,
    /// cache its result with `options`, and return it.
    ///
    /// `fetcher` is invoked at most once per call. Concurrent callers racing
    /// on the same cold key may each invoke their own fetcher; there is no
    /// cross-call single-flight.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: &CacheOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key, options.backend.as_deref()).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Wrap an async producer so calls with equal generated keys reuse
    /// `get_or_set`. The default key serializes the argument; callers
    /// needing custom equality supply a key generator.
    pub fn memoize<F>(self: &Arc<Self>, name: impl Into<String>, f: F, options: CacheOptions) -> Memoized<F> {
        Memoized {
            manager: Arc::clone(self),
            name: name.into(),
            options,
            key_generator: None,
            f,
        }
    }

    /// Clear process-local state. Distributed backends are left untouched:
    /// their contents are shared with other instances and expire via TTL.
    pub async fn shutdown(&self) {
        for (name, backend) in &self.backends {
            if !backend.is_distributed() {
                backend.clear(None).await;
                debug!(backend = %name, "Cleared local cache state on shutdown");
            }
        }
        info!("Cache manager shut down");
    }
}

/// Key derivation for memoized calls.
pub type KeyGenerator = Box<dyn Fn(&serde_json::Value) -> String + Send + Sync>;

/// A memoized async function bound to a manager and write options.
pub struct Memoized<F> {
    manager: Arc<CacheManager>,
    name: String,
    options: CacheOptions,
    key_generator: Option<KeyGenerator>,
    f: F,
}

impl<F> Memoized<F> {
    /// Override how cache keys are derived from the serialized arguments.
    pub fn with_key_generator(
        mut self,
        generator: impl Fn(&serde_json::Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_generator = Some(Box::new(generator));
        self
    }

    fn key_for(&self, args: &serde_json::Value) -> String {
        match &self.key_generator {
            Some(generator) => generator(args),
            None => format!("{}:{}", self.name, args),
        }
    }

    /// Invoke the wrapped function through the cache.
    ///
    /// When the arguments cannot be serialized into a key, the call bypasses
    /// the cache entirely rather than failing.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match serde_json::to_value(&args) {
            Ok(value) => self.key_for(&value),
            Err(e) => {
                warn!(name = %self.name, error = %e, "Memoize arguments not serializable, bypassing cache");
                return (self.f)(args).await;
            }
        };

        self.manager
            .get_or_set(&key, || (self.f)(args), &self.options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct QueryResult {
        rows: Vec<i64>,
    }

    fn manager() -> (Arc<CacheManager>, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let backend = Arc::new(MemoryBackend::new(Arc::new(clock.clone())));
        (Arc::new(CacheManager::new("memory", backend)), clock)
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let (manager, _clock) = manager();
        let value = QueryResult { rows: vec![1, 2, 3] };

        manager.set("q:abc", &value, &CacheOptions::ttl(60_000)).await;
        let cached: Option<QueryResult> = manager.get("q:abc", None).await;
        assert_eq!(cached, Some(value));
    }

    #[tokio::test]
    async fn test_tag_invalidation_scenario() {
        let (manager, _clock) = manager();
        let value = QueryResult { rows: vec![1, 2, 3] };

        manager
            .set(
                "q:abc",
                &value,
                &CacheOptions::ttl(60_000).with_tags(["table:payments"]),
            )
            .await;
        manager
            .set(
                "q:other",
                &QueryResult { rows: vec![9] },
                &CacheOptions::ttl(60_000).with_tags(["table:orders"]),
            )
            .await;

        let removed = manager.invalidate_by_tags(&["table:payments"], None).await;
        assert_eq!(removed, 1);

        assert!(manager.get::<QueryResult>("q:abc", None).await.is_none());
        // Entries lacking the tag are untouched.
        assert!(manager.get::<QueryResult>("q:other", None).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidation_covers_all_tagged_entries() {
        let (manager, _clock) = manager();
        for i in 0..5 {
            manager
                .set(
                    &format!("q:{i}"),
                    &i,
                    &CacheOptions::ttl(60_000).with_tags(["table:payments"]),
                )
                .await;
        }

        let removed = manager.invalidate_by_tags(&["table:payments"], None).await;
        assert_eq!(removed, 5);
        for i in 0..5 {
            assert!(manager.get::<i32>(&format!("q:{i}"), None).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_get_or_set_invokes_fetcher_once() {
        let (manager, _clock) = manager();
        let calls = AtomicU32::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(QueryResult { rows: vec![42] })
        };

        let first = manager
            .get_or_set("q:warm", fetch, &CacheOptions::ttl(60_000))
            .await
            .unwrap();
        assert_eq!(first.rows, vec![42]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Warm hit: fetcher not invoked again.
        let second = manager
            .get_or_set(
                "q:warm",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(QueryResult { rows: vec![0] })
                },
                &CacheOptions::ttl(60_000),
            )
            .await
            .unwrap();
        assert_eq!(second.rows, vec![42]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_propagates_fetcher_error() {
        let (manager, _clock) = manager();

        let result: Result<QueryResult, &str> = manager
            .get_or_set("q:fail", || async { Err("warehouse timeout") }, &CacheOptions::ttl(1_000))
            .await;
        assert_eq!(result.unwrap_err(), "warehouse timeout");

        // Nothing was cached.
        assert!(manager.get::<QueryResult>("q:fail", None).await.is_none());
    }

    #[tokio::test]
    async fn test_replicated_write_reaches_all_backends() {
        let clock = ManualClock::new(0);
        let local = Arc::new(MemoryBackend::new(Arc::new(clock.clone())));
        let shared = Arc::new(MemoryBackend::new(Arc::new(clock.clone())));

        let mut manager = CacheManager::new("local", local);
        manager.register("shared", shared);

        manager
            .set("k", &7i64, &CacheOptions::ttl(60_000).replicated())
            .await;

        assert_eq!(manager.get::<i64>("k", Some("local")).await, Some(7));
        assert_eq!(manager.get::<i64>("k", Some("shared")).await, Some(7));
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back_to_default() {
        let (manager, _clock) = manager();
        manager.set("k", &1i64, &CacheOptions::ttl(60_000)).await;

        assert_eq!(manager.get::<i64>("k", Some("no-such-backend")).await, Some(1));
    }

    #[tokio::test]
    async fn test_memoize_reuses_cached_result() {
        let (manager, _clock) = manager();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let memoized = manager.memoize(
            "warehouse_query",
            move |params: (String, i64)| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(format!("{}-{}", params.0, params.1))
                }
            },
            CacheOptions::ttl(60_000),
        );

        let a = memoized.call(("revenue".to_string(), 30)).await.unwrap();
        let b = memoized.call(("revenue".to_string(), 30)).await.unwrap();
        let c = memoized.call(("revenue".to_string(), 7)).await.unwrap();

        assert_eq!(a, "revenue-30");
        assert_eq!(b, "revenue-30");
        assert_eq!(c, "revenue-7");
        // Equal arguments hit the cache; distinct arguments fetch again.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_custom_key_generator() {
        let (manager, _clock) = manager();

        let memoized = manager
            .memoize(
                "lookup",
                |id: i64| async move { Ok::<_, std::convert::Infallible>(id * 2) },
                CacheOptions::ttl(60_000),
            )
            .with_key_generator(|args| format!("custom:{args}"));

        assert_eq!(memoized.call(21).await.unwrap(), 42);
        assert_eq!(manager.get::<i64>("custom:21", None).await, Some(42));
    }

    #[tokio::test]
    async fn test_from_config_defaults_to_memory() {
        let config = CacheConfig::default();
        let manager = CacheManager::from_config(&config, Arc::new(ManualClock::new(0))).await;
        assert_eq!(manager.default_backend(), "memory");
    }

    #[tokio::test]
    async fn test_from_config_unknown_backend_falls_back() {
        let config = CacheConfig {
            backend: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let manager = CacheManager::from_config(&config, Arc::new(ManualClock::new(0))).await;
        assert_eq!(manager.default_backend(), "memory");
    }

    #[cfg(feature = "cache-redis")]
    #[tokio::test]
    async fn test_from_config_redis_without_connection_config() {
        let config = CacheConfig {
            backend: "redis".to_string(),
            redis: None,
            ..CacheConfig::default()
        };
        let manager = CacheManager::from_config(&config, Arc::new(ManualClock::new(0))).await;
        // Falls back to in-process when redis config is missing.
        assert_eq!(manager.default_backend(), "memory");
    }

    #[tokio::test]
    async fn test_shutdown_clears_local_state() {
        let (manager, _clock) = manager();
        manager.set("k", &1i64, &CacheOptions::ttl(60_000)).await;

        manager.shutdown().await;
        assert!(manager.get::<i64>("k", None).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry_through_manager() {
        let (manager, clock) = manager();
        manager.set("k", &1i64, &CacheOptions::ttl(5_000)).await;

        clock.advance(4_999);
        assert_eq!(manager.get::<i64>("k", None).await, Some(1));

        clock.advance(2);
        assert_eq!(manager.get::<i64>("k", None).await, None);
    }
}
