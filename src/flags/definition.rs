//! Flag definitions and the pure evaluation function.
//!
//! A definition describes *when* a flag is on; the evaluated boolean is a
//! pure function of `(definition, context, now)` and is never stored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A feature flag's rollout rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FlagDefinition {
    /// Master switch. When false, nothing else is checked.
    pub enabled: bool,
    /// Percentage of identified users the flag is on for. Values outside
    /// [0, 100] are clamped at evaluation time.
    pub rollout_percentage: i32,
    /// Role allow-list. Empty means every role qualifies.
    pub user_segments: Vec<String>,
    /// Flag is off before this instant.
    pub start_date: Option<DateTime<Utc>>,
    /// Flag is off after this instant.
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for FlagDefinition {
    fn default() -> Self {
        Self {
            enabled: false,
            rollout_percentage: 100,
            user_segments: Vec::new(),
            start_date: None,
            end_date: None,
            description: None,
            metadata: HashMap::new(),
        }
    }
}

impl FlagDefinition {
    /// A fully-on definition.
    pub fn on() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// A fully-off definition.
    pub fn off() -> Self {
        Self::default()
    }

    /// An enabled definition rolled out to `percentage` of identified users.
    pub fn percentage(percentage: i32) -> Self {
        Self {
            enabled: true,
            rollout_percentage: percentage,
            ..Self::default()
        }
    }
}

/// Per-request context a flag is evaluated against. All fields optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EvalContext {
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub environment: Option<String>,
}

impl EvalContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.user_role = Some(role.into());
        self
    }
}

/// Decide whether a flag is on for the given context at the given instant.
///
/// Checks run in a fixed order, each short-circuiting to `false`:
/// master switch, date window, role allow-list, percentage bucket.
pub fn evaluate(definition: &FlagDefinition, context: &EvalContext, now_ms: i64) -> bool {
    if !definition.enabled {
        return false;
    }

    if let Some(start) = definition.start_date {
        if now_ms < start.timestamp_millis() {
            return false;
        }
    }
    if let Some(end) = definition.end_date {
        if now_ms > end.timestamp_millis() {
            return false;
        }
    }

    if !definition.user_segments.is_empty() {
        let Some(role) = &context.user_role else {
            return false;
        };
        if !definition.user_segments.iter().any(|s| s == role) {
            return false;
        }
    }

    let percentage = definition.rollout_percentage.clamp(0, 100);
    if percentage < 100 {
        return bucket_for(context.user_id.as_deref()) < percentage as u32;
    }

    true
}

/// Map an identifier to a stable bucket in `0..100`.
///
/// The hash is the polynomial rolling hash `h = h * 31 + unit` (in its
/// `(h << 5) - h` form) over UTF-16 code units, wrapping at 32 bits with the
/// absolute value taken, so a given identifier lands in the same bucket
/// across processes and restarts. Anonymous contexts get a fresh random
/// bucket per call, making rollout non-sticky for them.
pub fn bucket_for(identifier: Option<&str>) -> u32 {
    match identifier {
        Some(id) => string_hash(id) % 100,
        None => fastrand::u32(0..100),
    }
}

fn string_hash(s: &str) -> u32 {
    let mut h: i32 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit));
    }
    h.unsigned_abs()
}

/// Parse a date bound, used when loading definitions from JSON sources that
/// carry dates as epoch milliseconds.
pub fn date_from_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
