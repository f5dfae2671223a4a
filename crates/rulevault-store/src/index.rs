//! Version index: fast rule/version listing without directory scans.
//!
//! Derived structure, always rebuildable from the `rule_versions/` tree.
//! The store rewrites it atomically on every mutation, so a crash can at
//! worst leave a stale index, never a corrupt one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use rulevault_core::RuleVersion;

/// Per-rule entry: known version ids plus the active pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleIndexEntry {
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub active_version: Option<String>,
}

/// The on-disk index document (`version_index.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageIndex {
    #[serde(default)]
    pub rules: BTreeMap<String, RuleIndexEntry>,
    pub last_updated: DateTime<Utc>,
}

impl Default for StorageIndex {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl StorageIndex {
    /// Record a saved version, updating the active pointer when it is active.
    pub fn record(&mut self, version: &RuleVersion) {
        let entry = self.rules.entry(version.rule_id.clone()).or_default();
        if !entry.versions.contains(&version.version_id) {
            entry.versions.push(version.version_id.clone());
        }
        if version.is_active {
            entry.active_version = Some(version.version_id.clone());
        } else if entry.active_version.as_deref() == Some(version.version_id.as_str()) {
            // Re-save of a now-inactive version drops the stale pointer.
            entry.active_version = None;
        }
        self.last_updated = Utc::now();
    }

    /// Remove one version id; clears the active pointer if it pointed there.
    ///
    /// Returns true when the id was present.
    pub fn remove(&mut self, rule_id: &str, version_id: &str) -> bool {
        let Some(entry) = self.rules.get_mut(rule_id) else {
            return false;
        };
        let before = entry.versions.len();
        entry.versions.retain(|v| v != version_id);
        let removed = entry.versions.len() < before;
        if entry.active_version.as_deref() == Some(version_id) {
            entry.active_version = None;
        }
        if entry.versions.is_empty() {
            self.rules.remove(rule_id);
        }
        if removed {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Drop the active pointer for a rule (deactivation path).
    pub fn clear_active(&mut self, rule_id: &str) {
        if let Some(entry) = self.rules.get_mut(rule_id) {
            entry.active_version = None;
            self.last_updated = Utc::now();
        }
    }
}
