//! Feature flag evaluator.
//!
//! Caches flag *definitions* for a short window and evaluates them per call;
//! the resulting boolean depends on the caller's context and is never
//! cached. Resolution falls through three layers: the external provider,
//! the built-in default table, then the caller's `default_value`. Provider
//! outages degrade silently to the next layer.

use super::definition::{evaluate, EvalContext, FlagDefinition};
use super::provider::FlagProvider;
use crate::clock::Clock;
use crate::config::FlagConfig;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A cached provider answer. `None` records a confirmed miss so repeated
/// lookups of an unknown flag do not hammer the provider.
#[derive(Debug, Clone)]
struct CachedDefinition {
    definition: Option<FlagDefinition>,
    fetched_at: i64,
}

/// Evaluates feature flags against per-request contexts.
#[derive(Debug)]
pub struct FeatureFlags {
    provider: Option<Arc<dyn FlagProvider>>,
    defaults: HashMap<String, FlagDefinition>,
    definitions: DashMap<String, CachedDefinition>,
    definition_ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl FeatureFlags {
    /// Evaluator with no external provider; resolution uses the built-in
    /// default table only.
    pub fn new(config: &FlagConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider: None,
            defaults: default_flags(),
            definitions: DashMap::new(),
            definition_ttl_ms: config.definition_ttl_ms,
            clock,
        }
    }

    /// Attach an external definition source.
    pub fn with_provider(mut self, provider: Arc<dyn FlagProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the built-in default table.
    pub fn with_defaults(mut self, defaults: HashMap<String, FlagDefinition>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Whether `name` is on for `context`, falling back to `default_value`
    /// when no definition exists anywhere.
    pub async fn get_flag(&self, name: &str, context: &EvalContext, default_value: bool) -> bool {
        match self.resolve(name).await {
            Some(definition) => {
                let result = evaluate(&definition, context, self.clock.now_ms());
                debug!(flag = name, result = result, "Evaluated feature flag");
                result
            }
            None => {
                debug!(flag = name, default = default_value, "Flag not defined, using default");
                default_value
            }
        }
    }

    /// Batch evaluation; each name goes through the identical single-flag
    /// path with `false` as the default.
    pub async fn get_flags(
        &self,
        names: &[&str],
        context: &EvalContext,
    ) -> HashMap<String, bool> {
        let evaluations = names
            .iter()
            .map(|name| async move { (name.to_string(), self.get_flag(name, context, false).await) });
        join_all(evaluations).await.into_iter().collect()
    }

    /// The raw definition a flag would be evaluated against, if any.
    pub async fn get_flag_config(&self, name: &str) -> Option<FlagDefinition> {
        self.resolve(name).await
    }

    /// Drop all cached definitions; the next lookup re-fetches.
    pub fn invalidate_definitions(&self) {
        self.definitions.clear();
    }

    /// Provider first (through the definition cache), then the default
    /// table. Provider errors fall through to defaults with a warning.
    async fn resolve(&self, name: &str) -> Option<FlagDefinition> {
        if let Some(cached) = self.cached_definition(name) {
            if let Some(definition) = cached {
                return Some(definition);
            }
            // Cached negative: skip the provider, go straight to defaults.
            return self.defaults.get(name).cloned();
        }

        if let Some(provider) = &self.provider {
            match provider.fetch(name).await {
                Ok(fetched) => {
                    self.definitions.insert(
                        name.to_string(),
                        CachedDefinition {
                            definition: fetched.clone(),
                            fetched_at: self.clock.now_ms(),
                        },
                    );
                    if let Some(definition) = fetched {
                        return Some(definition);
                    }
                }
                Err(e) => {
                    warn!(flag = name, error = %e, "Flag provider failed, falling back to defaults");
                }
            }
        }

        self.defaults.get(name).cloned()
    }

    /// `Some(answer)` when a live cache record exists; stale records are
    /// evicted and report as absent.
    fn cached_definition(&self, name: &str) -> Option<Option<FlagDefinition>> {
        let now = self.clock.now_ms();
        let stale = match self.definitions.get(name) {
            Some(cached) if now - cached.fetched_at <= self.definition_ttl_ms => {
                return Some(cached.definition.clone());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            self.definitions.remove(name);
        }
        None
    }
}

/// Flags the dashboard ships with when no provider is configured.
pub fn default_flags() -> HashMap<String, FlagDefinition> {
    let mut defaults = HashMap::new();
    defaults.insert("beta_ui".to_string(), FlagDefinition::off());
    defaults.insert("csv_export".to_string(), FlagDefinition::on());
    defaults.insert("scheduled_reports".to_string(), FlagDefinition::on());
    defaults.insert("query_result_compression".to_string(), FlagDefinition::off());
    defaults.insert(
        "dashboard_sharing".to_string(),
        FlagDefinition {
            enabled: true,
            user_segments: vec!["admin".to_string(), "editor".to_string()],
            ..FlagDefinition::default()
        },
    );
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::flags::provider::{FlagProviderError, StaticFlagProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flags_with(provider: StaticFlagProvider, clock: ManualClock) -> FeatureFlags {
        FeatureFlags::new(&FlagConfig::default(), Arc::new(clock))
            .with_provider(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_provider_definition_wins() {
        let clock = ManualClock::new(1_000_000);
        let provider = StaticFlagProvider::default().with_flag("beta_ui", FlagDefinition::on());
        let flags = flags_with(provider, clock);

        // The built-in default for beta_ui is off; the provider overrides.
        assert!(flags.get_flag("beta_ui", &EvalContext::default(), false).await);
    }

    #[tokio::test]
    async fn test_unknown_flag_uses_default_value() {
        let clock = ManualClock::new(0);
        let flags = flags_with(StaticFlagProvider::default(), clock);

        assert!(flags.get_flag("no_such_flag", &EvalContext::default(), true).await);
        assert!(!flags.get_flag("no_such_flag", &EvalContext::default(), false).await);
    }

    #[tokio::test]
    async fn test_builtin_table_answers_without_provider() {
        let flags = FeatureFlags::new(&FlagConfig::default(), Arc::new(ManualClock::new(0)));

        assert!(flags.get_flag("csv_export", &EvalContext::default(), false).await);
        assert!(!flags.get_flag("beta_ui", &EvalContext::default(), true).await);
    }

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
        empty: bool,
    }

    #[async_trait]
    impl FlagProvider for CountingProvider {
        async fn fetch(&self, _name: &str) -> Result<Option<FlagDefinition>, FlagProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FlagProviderError::Unavailable("connection refused".to_string()));
            }
            if self.empty {
                return Ok(None);
            }
            Ok(Some(FlagDefinition::on()))
        }
    }

    #[tokio::test]
    async fn test_definitions_are_cached_for_the_ttl_window() {
        let clock = ManualClock::new(0);
        let provider = Arc::new(CountingProvider::default());
        let flags = FeatureFlags::new(&FlagConfig::default(), Arc::new(clock.clone()))
            .with_provider(provider.clone());

        let ctx = EvalContext::default();
        flags.get_flag("x", &ctx, false).await;
        flags.get_flag("x", &ctx, false).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        clock.advance(FlagConfig::default().definition_ttl_ms + 1);
        flags.get_flag("x", &ctx, false).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_negative_lookups_are_cached() {
        let provider = Arc::new(CountingProvider {
            empty: true,
            ..CountingProvider::default()
        });
        let flags = FeatureFlags::new(&FlagConfig::default(), Arc::new(ManualClock::new(0)))
            .with_provider(provider.clone());

        let ctx = EvalContext::default();
        assert!(!flags.get_flag("ghost", &ctx, false).await);
        assert!(!flags.get_flag("ghost", &ctx, false).await);
        // The confirmed miss is cached; the provider is asked once.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_defaults() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: true,
            empty: false,
        });
        let flags = FeatureFlags::new(&FlagConfig::default(), Arc::new(ManualClock::new(0)))
            .with_provider(provider);

        // csv_export is on in the built-in table.
        assert!(flags.get_flag("csv_export", &EvalContext::default(), false).await);
        // Unknown everywhere: caller default.
        assert!(flags.get_flag("ghost", &EvalContext::default(), true).await);
    }

    #[tokio::test]
    async fn test_batch_matches_single_evaluation() {
        let provider = StaticFlagProvider::default()
            .with_flag("a", FlagDefinition::on())
            .with_flag("b", FlagDefinition::percentage(50));
        let flags = flags_with(provider, ManualClock::new(0));
        let ctx = EvalContext::for_user("u42");

        let batch = flags.get_flags(&["a", "b", "missing"], &ctx).await;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch["a"], flags.get_flag("a", &ctx, false).await);
        assert_eq!(batch["b"], flags.get_flag("b", &ctx, false).await);
        assert!(!batch["missing"]);
    }

    #[tokio::test]
    async fn test_fifty_percent_rollout_is_stable_over_repeated_calls() {
        let provider = StaticFlagProvider::default()
            .with_flag("beta_ui", FlagDefinition::percentage(50));
        let flags = flags_with(provider, ManualClock::new(0));
        let ctx = EvalContext::for_user("u42");

        let first = flags.get_flag("beta_ui", &ctx, false).await;
        for _ in 0..100 {
            assert_eq!(flags.get_flag("beta_ui", &ctx, false).await, first);
        }
    }

    #[tokio::test]
    async fn test_get_flag_config_exposes_definition() {
        let provider = StaticFlagProvider::default()
            .with_flag("beta_ui", FlagDefinition::percentage(25));
        let flags = flags_with(provider, ManualClock::new(0));

        let config = flags.get_flag_config("beta_ui").await.unwrap();
        assert_eq!(config.rollout_percentage, 25);
        assert!(flags.get_flag_config("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_definitions_forces_refetch() {
        let provider = Arc::new(CountingProvider::default());
        let flags = FeatureFlags::new(&FlagConfig::default(), Arc::new(ManualClock::new(0)))
            .with_provider(provider.clone());

        flags.get_flag("x", &EvalContext::default(), false).await;
        flags.invalidate_definitions();
        flags.get_flag("x", &EvalContext::default(), false).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
