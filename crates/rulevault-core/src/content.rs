//! Opaque rule content with typed accessors.
//!
//! Rule content is caller-defined: the pipeline, the LLM proposer, and the
//! dashboard all attach their own fields. The store treats it as an opaque
//! map and only reads the handful of well-known keys that drive impact
//! scoring and conflict analysis (`pattern`, `replacement`, `confidence`,
//! `priority`, `rule_type`).
//!
//! The backing map is `serde_json::Map`, which keeps keys sorted, so the
//! canonical serialization is byte-exact and reproducible across runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel key written by rule deactivation.
pub const DEACTIVATED_KEY: &str = "_deactivated";

/// Sentinel key carrying the deactivation reason.
pub const DEACTIVATION_REASON_KEY: &str = "_deactivation_reason";

/// Default confidence assumed when a rule carries none.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// An opaque rule payload: pattern/replacement plus caller-defined metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleContent(pub Map<String, Value>);

impl RuleContent {
    /// Build empty content.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The match pattern, if present.
    pub fn pattern(&self) -> Option<&str> {
        self.0.get("pattern").and_then(Value::as_str)
    }

    /// The replacement text, if present.
    pub fn replacement(&self) -> Option<&str> {
        self.0.get("replacement").and_then(Value::as_str)
    }

    /// Rule confidence in `[0, 1]`; falls back to [`DEFAULT_CONFIDENCE`].
    pub fn confidence(&self) -> f64 {
        self.0
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    /// Rule priority, if present.
    pub fn priority(&self) -> Option<i64> {
        self.0.get("priority").and_then(Value::as_i64)
    }

    /// Rule type tag (e.g. `"normalization"`), if present.
    pub fn rule_type(&self) -> Option<&str> {
        self.0.get("rule_type").and_then(Value::as_str)
    }

    /// Whether this content carries the retirement sentinel.
    pub fn is_deactivated(&self) -> bool {
        self.0
            .get(DEACTIVATED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Insert or replace a field.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Copy of this content carrying the retirement sentinel.
    pub fn retired(&self, reason: &str) -> Self {
        let mut content = self.clone();
        content.set(DEACTIVATED_KEY, Value::Bool(true));
        content.set(DEACTIVATION_REASON_KEY, Value::String(reason.to_string()));
        content
    }

    /// Byte-exact canonical serialization: sorted keys, serde_json's fixed
    /// numeric formatting. Identity input for version-id hashing.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for RuleContent {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
