//! Backup bundles and destructive restore.
//!
//! A backup is one JSON document holding every version in the store. Restore
//! is the only destructive multi-step flow: it backs up the current state
//! first, stages the old tree aside, then replays the bundle through
//! `save_rule_version` so every invariant (index, active snapshots,
//! single-active) is re-derived rather than trusted from the bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rulevault_core::RuleVersion;

use crate::json_file::{read_json, write_json};
use crate::storage::{RuleStore, StoreError};

/// On-disk backup document (`backups/<name>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupBundle {
    pub backup_timestamp: DateTime<Utc>,
    pub total_versions: usize,
    pub versions: Vec<RuleVersion>,
}

/// Result of a completed restore.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// Versions successfully replayed into the fresh tree.
    pub restored: usize,
    /// Bundle entries that failed to replay (logged and skipped).
    pub skipped: usize,
    /// Self-backup of the pre-restore state, taken before anything moved.
    pub pre_restore_backup: PathBuf,
}

impl RuleStore {
    /// Serialize every version into one timestamped bundle under `backups/`.
    ///
    /// Returns the bundle path. `name` defaults to
    /// `complete_backup_<stamp>`.
    pub fn create_backup(&mut self, name: Option<&str>) -> Result<PathBuf, StoreError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("complete_backup_{}", Utc::now().format("%Y%m%d_%H%M%S")),
        };
        let backup_file = self.backups_path().join(format!("{name}.json"));

        let versions = self.load_all_versions();
        let bundle = BackupBundle {
            backup_timestamp: Utc::now(),
            total_versions: versions.len(),
            versions,
        };
        write_json(&backup_file, &bundle)?;

        info!(path = %backup_file.display(), versions = bundle.total_versions, "created backup");
        Ok(backup_file)
    }

    /// Destructively replace the version tree with a bundle's contents.
    ///
    /// Safety order: self-backup first, then stage the old tree aside, then
    /// replay. A failure partway leaves either the pre-restore backup or the
    /// staged tree recoverable; the staged tree is only removed after every
    /// bundle entry replayed cleanly.
    pub fn restore_from_backup(
        &mut self,
        backup: impl AsRef<Path>,
    ) -> Result<RestoreOutcome, StoreError> {
        let backup = backup.as_ref();
        let backup_path = if backup.exists() {
            backup.to_path_buf()
        } else {
            let under_backups = self.backups_path().join(backup);
            if !under_backups.exists() {
                return Err(StoreError::BackupNotFound(backup.display().to_string()));
            }
            under_backups
        };

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let pre_restore_backup = self.create_backup(Some(&format!("pre_restore_backup_{stamp}")))?;

        let bundle: BackupBundle = read_json(&backup_path)?;
        let versions = normalize_single_active(bundle.versions);

        // Stage the current tree aside before touching anything.
        let stage_dir = self.base_path().join(format!("restore_stage_{stamp}"));
        fs::create_dir_all(&stage_dir).map_err(|e| StoreError::io(&stage_dir, e))?;
        stage_aside(self.versions_path(), &stage_dir.join("rule_versions"))?;
        stage_aside(self.active_dir(), &stage_dir.join("active"))?;
        self.ensure_directories()?;
        self.reset_index()?;

        let mut restored = 0usize;
        let mut skipped = 0usize;
        for version in &versions {
            match self.save_rule_version(version) {
                Ok(()) => restored += 1,
                Err(err) => {
                    warn!(
                        rule_id = %version.rule_id,
                        version_id = %version.version_id,
                        error = %err,
                        "failed to replay version from backup"
                    );
                    skipped += 1;
                }
            }
        }

        if skipped == 0 {
            let _ = fs::remove_dir_all(&stage_dir);
        } else {
            warn!(
                stage = %stage_dir.display(),
                skipped,
                "restore replayed with skips; keeping staged pre-restore tree"
            );
        }

        info!(restored, skipped, "restored from backup");
        Ok(RestoreOutcome {
            restored,
            skipped,
            pre_restore_backup,
        })
    }
}

/// Re-derive the single-active invariant instead of trusting the bundle:
/// per rule, only the newest version flagged active stays active.
fn normalize_single_active(mut versions: Vec<RuleVersion>) -> Vec<RuleVersion> {
    versions.sort_by(|a, b| {
        (a.rule_id.as_str(), a.timestamp).cmp(&(b.rule_id.as_str(), b.timestamp))
    });

    let mut keep_active: BTreeMap<String, String> = BTreeMap::new();
    for version in &versions {
        if version.is_active {
            keep_active.insert(version.rule_id.clone(), version.version_id.clone());
        }
    }
    for version in &mut versions {
        version.is_active =
            keep_active.get(&version.rule_id).map(String::as_str) == Some(&version.version_id);
    }
    versions
}

fn stage_aside(from: &Path, to: &Path) -> Result<(), StoreError> {
    if from.exists() {
        fs::rename(from, to).map_err(|e| StoreError::io(from, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulevault_core::{ChangeType, RuleContent};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_base(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "rulevault-backup-{prefix}-{}-{unique}",
            std::process::id()
        ))
    }

    fn version(rule_id: &str, version_id: &str, is_active: bool, at: DateTime<Utc>) -> RuleVersion {
        let mut content = RuleContent::new();
        content.set("pattern", json!("A"));
        RuleVersion {
            version_id: version_id.to_string(),
            rule_id: rule_id.to_string(),
            rule_content: content,
            timestamp: at,
            author: "u1".to_string(),
            change_description: String::new(),
            parent_version: None,
            is_active,
            change_type: ChangeType::Creation,
            impact_score: 1.0,
        }
    }

    #[test]
    fn backup_then_restore_reproduces_state() {
        let base = temp_base("roundtrip");
        let mut store = RuleStore::open(&base).expect("store should open");

        let t0 = Utc::now();
        let mut v1 = version("r1", "v1", false, t0);
        v1.rule_content.set("replacement", json!("a"));
        store.save_rule_version(&v1).expect("save v1");
        store
            .save_rule_version(&version("r1", "v2", true, t0 + chrono::Duration::seconds(1)))
            .expect("save v2");
        store
            .save_rule_version(&version("r2", "v3", true, t0))
            .expect("save v3");

        let active_before = store.get_active_rules();
        let total_before = store.load_all_versions().len();

        let bundle = store.create_backup(None).expect("backup should succeed");
        let outcome = store
            .restore_from_backup(&bundle)
            .expect("restore should succeed");

        assert_eq!(outcome.restored, total_before);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(store.load_all_versions().len(), total_before);
        assert_eq!(store.get_active_rules(), active_before);
        assert!(outcome.pre_restore_backup.exists());

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn restore_by_bundle_name_resolves_under_backups() {
        let base = temp_base("byname");
        let mut store = RuleStore::open(&base).expect("store should open");
        store
            .save_rule_version(&version("r1", "v1", true, Utc::now()))
            .expect("save v1");

        store
            .create_backup(Some("nightly"))
            .expect("backup should succeed");
        let outcome = store
            .restore_from_backup("nightly.json")
            .expect("restore by name should succeed");
        assert_eq!(outcome.restored, 1);

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn missing_backup_fails_without_touching_state() {
        let base = temp_base("missing");
        let mut store = RuleStore::open(&base).expect("store should open");
        store
            .save_rule_version(&version("r1", "v1", true, Utc::now()))
            .expect("save v1");

        let err = store
            .restore_from_backup("no_such_backup.json")
            .expect_err("missing bundle must error");
        assert!(matches!(err, StoreError::BackupNotFound(_)));
        assert_eq!(store.load_all_versions().len(), 1);
        assert_eq!(store.get_active_rules().len(), 1);

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn normalize_single_active_keeps_only_newest_flagged() {
        let t0 = Utc::now();
        let normalized = normalize_single_active(vec![
            version("r1", "v1", true, t0),
            version("r1", "v2", true, t0 + chrono::Duration::seconds(1)),
            version("r2", "v3", false, t0),
        ]);

        let actives: Vec<_> = normalized
            .iter()
            .filter(|v| v.is_active)
            .map(|v| v.version_id.as_str())
            .collect();
        assert_eq!(actives, vec!["v2"]);
    }
}
