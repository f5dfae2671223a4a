//! RuleVersion: one node in a rule's append-only version chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::RuleContent;

/// How a version entered the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// First version of a rule.
    Creation,
    /// Edit of an existing rule.
    Modification,
    /// Forward-only fork copying an earlier version's content.
    Rollback,
    /// Retirement record; the rule leaves the active set.
    Deactivation,
}

impl ChangeType {
    /// Stable wire tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Creation => "creation",
            ChangeType::Modification => "modification",
            ChangeType::Rollback => "rollback",
            ChangeType::Deactivation => "deactivation",
        }
    }
}

/// One immutable version of a rule, with full audit metadata.
///
/// Chain invariants (enforced by the version manager, persisted by the
/// store):
/// - `version_id` is unique within the chain
/// - at most one version per `rule_id` has `is_active = true`
/// - `parent_version`, when set, names an earlier version of the same chain
/// - persisted chain order is timestamp-non-decreasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVersion {
    // ── Identity ──
    pub version_id: String,
    pub rule_id: String,

    // ── Payload ──
    pub rule_content: RuleContent,

    // ── Audit ──
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub change_description: String,
    #[serde(default)]
    pub parent_version: Option<String>,

    // ── Lifecycle ──
    pub is_active: bool,
    #[serde(default = "default_change_type")]
    pub change_type: ChangeType,
    #[serde(default)]
    pub impact_score: f64,
}

fn default_change_type() -> ChangeType {
    ChangeType::Modification
}
