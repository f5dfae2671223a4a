//! Conflict records and the rule view they are computed over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rulevault_core::{DEFAULT_CONFIDENCE, RuleVersion};

/// Id used on the second side of single-rule findings, where no real
/// second rule is involved (invalid regex, performance flags).
pub const SYSTEM_RULE_ID: &str = "system";

/// Classification of a detected incompatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two same-type rules would fire on shared inputs.
    PatternOverlap,
    /// The candidate's pattern does not compile.
    RegexConflict,
    /// Effectively identical patterns with different replacements.
    ReplacementAmbiguity,
    /// Each rule's replacement re-triggers the other's pattern.
    CircularDependency,
    /// Near-identical patterns carrying widely different priorities.
    PriorityConflict,
    /// Complex candidate pattern against an already-large active set.
    PerformanceImpact,
}

impl ConflictKind {
    /// Stable wire tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::PatternOverlap => "pattern_overlap",
            ConflictKind::RegexConflict => "regex_conflict",
            ConflictKind::ReplacementAmbiguity => "replacement_ambiguity",
            ConflictKind::CircularDependency => "circular_dependency",
            ConflictKind::PriorityConflict => "priority_conflict",
            ConflictKind::PerformanceImpact => "performance_impact",
        }
    }
}

/// How badly a conflict blocks activation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// The fields conflict analysis reads from a rule.
///
/// Built either directly by a caller proposing a candidate, or projected
/// from an active [`RuleVersion`]. Everything beyond `pattern` and
/// `replacement` is optional and only sharpens severity or resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleProfile {
    #[serde(default)]
    pub id: Option<String>,
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RuleProfile {
    /// Minimal candidate: pattern and replacement only.
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            id: None,
            pattern: pattern.into(),
            replacement: replacement.into(),
            rule_type: None,
            confidence: None,
            priority: None,
            timestamp: None,
        }
    }

    /// Project the analyzable fields out of an active version.
    pub fn from_version(version: &RuleVersion) -> Self {
        let content = &version.rule_content;
        Self {
            id: Some(version.rule_id.clone()),
            pattern: content.pattern().unwrap_or_default().to_string(),
            replacement: content.replacement().unwrap_or_default().to_string(),
            rule_type: content.rule_type().map(str::to_string),
            confidence: Some(content.confidence()),
            priority: content.priority(),
            timestamp: Some(version.timestamp),
        }
    }

    /// Marker profile for single-rule findings; carries [`SYSTEM_RULE_ID`]
    /// and no pattern, so reports never mistake it for a real rule.
    pub fn system() -> Self {
        Self {
            id: Some(SYSTEM_RULE_ID.to_string()),
            pattern: String::new(),
            replacement: String::new(),
            rule_type: None,
            confidence: None,
            priority: None,
            timestamp: None,
        }
    }

    /// Rule id for reporting; candidates without one show as `"unknown"`.
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }

    /// Confidence with the store-wide default applied.
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }
}

/// A detected incompatibility between a candidate and an active rule.
///
/// Transient: produced and consumed by callers, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub conflict_id: String,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub first: RuleProfile,
    pub second: RuleProfile,
    pub description: String,
    pub suggested_resolution: String,
    pub impact_assessment: String,
    pub auto_resolvable: bool,
}

impl Conflict {
    pub(crate) fn new(
        kind: ConflictKind,
        severity: Severity,
        first: RuleProfile,
        second: RuleProfile,
    ) -> Self {
        Self {
            conflict_id: Uuid::new_v4().to_string(),
            kind,
            severity,
            first,
            second,
            description: String::new(),
            suggested_resolution: String::new(),
            impact_assessment: String::new(),
            auto_resolvable: false,
        }
    }

    /// Rule ids on both sides of the conflict.
    pub fn involved_rule_ids(&self) -> [&str; 2] {
        [self.first.id_or_unknown(), self.second.id_or_unknown()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulevault_core::{ChangeType, RuleContent};
    use serde_json::json;

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn profile_projects_version_fields() {
        let mut content = RuleContent::new();
        content.set("pattern", json!("\\bCORP\\b"));
        content.set("replacement", json!("CORPORATION"));
        content.set("rule_type", json!("normalization"));
        content.set("confidence", json!(0.9));
        content.set("priority", json!(2));

        let version = RuleVersion {
            version_id: "v1".to_string(),
            rule_id: "r1".to_string(),
            rule_content: content,
            timestamp: Utc::now(),
            author: "u1".to_string(),
            change_description: String::new(),
            parent_version: None,
            is_active: true,
            change_type: ChangeType::Creation,
            impact_score: 1.0,
        };

        let profile = RuleProfile::from_version(&version);
        assert_eq!(profile.id.as_deref(), Some("r1"));
        assert_eq!(profile.pattern, "\\bCORP\\b");
        assert_eq!(profile.replacement, "CORPORATION");
        assert_eq!(profile.rule_type.as_deref(), Some("normalization"));
        assert_eq!(profile.priority, Some(2));
        assert!(profile.timestamp.is_some());
    }

    #[test]
    fn missing_id_reports_unknown() {
        let profile = RuleProfile::new("A", "a");
        assert_eq!(profile.id_or_unknown(), "unknown");
        assert_eq!(profile.effective_confidence(), DEFAULT_CONFIDENCE);
    }
}
