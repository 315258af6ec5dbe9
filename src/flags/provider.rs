//! External flag-definition sources.

use super::definition::FlagDefinition;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by a flag provider. Callers treat any of these as
/// "provider unavailable" and fall through to defaults.
#[derive(Debug, Error)]
pub enum FlagProviderError {
    #[error("Flag provider unavailable: {0}")]
    Unavailable(String),

    #[error("Flag definition malformed: {0}")]
    Malformed(String),
}

/// Source of raw flag definitions, typically a management service or a
/// config store. `Ok(None)` means the provider is healthy but has no such
/// flag; errors mean the provider could not answer at all.
#[async_trait]
pub trait FlagProvider: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, name: &str) -> Result<Option<FlagDefinition>, FlagProviderError>;
}

/// Fixed in-memory provider, useful for tests and static deployments.
#[derive(Debug, Default)]
pub struct StaticFlagProvider {
    flags: HashMap<String, FlagDefinition>,
}

impl StaticFlagProvider {
    pub fn new(flags: HashMap<String, FlagDefinition>) -> Self {
        Self { flags }
    }

    pub fn with_flag(mut self, name: impl Into<String>, definition: FlagDefinition) -> Self {
        self.flags.insert(name.into(), definition);
        self
    }
}

#[async_trait]
impl FlagProvider for StaticFlagProvider {
    async fn fetch(&self, name: &str) -> Result<Option<FlagDefinition>, FlagProviderError> {
        Ok(self.flags.get(name).cloned())
    }
}
