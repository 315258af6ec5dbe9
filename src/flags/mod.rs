//! Feature flags: definition model, providers, and the evaluator.
//!
//! Definitions are fetched from a [`FlagProvider`] and cached briefly;
//! evaluated booleans are computed fresh per call from the definition and
//! the caller's [`EvalContext`]. Resolution degrades from provider to the
//! built-in default table to the caller-supplied default, never to an
//! error.

pub mod definition;
pub mod evaluator;
pub mod provider;

pub use definition::{evaluate, EvalContext, FlagDefinition};
pub use evaluator::{default_flags, FeatureFlags};
pub use provider::{FlagProvider, FlagProviderError, StaticFlagProvider};
