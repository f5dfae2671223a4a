//! Durable rule-version storage.
//!
//! Layout under the store root:
//!
//! ```text
//! <base>/rule_versions/<rule_id>/<version_id>.json   one file per version
//! <base>/active/<rule_id>.json                       active-version snapshot
//! <base>/version_index.json                          derived index
//! <base>/backups/<name>.json                         backup bundles
//! ```
//!
//! The `active/` directory is the hot read path: the pipeline loads the
//! active rule set in O(#rules) regardless of how deep the history grows.
//! Reads degrade gracefully (corrupt files are logged and skipped); writes
//! fail loud.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use rulevault_core::RuleVersion;

use crate::index::StorageIndex;
use crate::json_file::{JsonFileError, read_json, write_json};

const VERSIONS_DIR: &str = "rule_versions";
const ACTIVE_DIR: &str = "active";
const BACKUPS_DIR: &str = "backups";
const INDEX_FILE: &str = "version_index.json";

/// Errors raised by the durable layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Json(#[from] JsonFileError),

    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("backup not found: {0}")]
    BackupNotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Storage usage summary, for monitoring only.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStatistics {
    pub total_rules: usize,
    pub total_versions: usize,
    pub storage_size_bytes: u64,
    pub rule_distribution: BTreeMap<String, usize>,
    pub oldest_version: Option<DateTime<Utc>>,
    pub newest_version: Option<DateTime<Utc>>,
}

/// File-backed store for rule versions, with a derived index and an
/// active-snapshot directory.
#[derive(Debug)]
pub struct RuleStore {
    base_path: PathBuf,
    versions_path: PathBuf,
    active_path: PathBuf,
    backups_path: PathBuf,
    index_path: PathBuf,
    index: StorageIndex,
}

impl RuleStore {
    /// Open (or initialize) a store rooted at `base`.
    ///
    /// Creates the directory skeleton and loads the index, rebuilding it
    /// from the version tree when missing or unreadable.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base.into();
        let mut store = Self {
            versions_path: base_path.join(VERSIONS_DIR),
            active_path: base_path.join(ACTIVE_DIR),
            backups_path: base_path.join(BACKUPS_DIR),
            index_path: base_path.join(INDEX_FILE),
            base_path,
            index: StorageIndex::default(),
        };
        store.ensure_directories()?;

        store.index = if store.index_path.exists() {
            match read_json(&store.index_path) {
                Ok(index) => index,
                Err(err) => {
                    warn!(error = %err, "version index unreadable; rebuilding from tree");
                    store.rebuild_index()?
                }
            }
        } else {
            store.rebuild_index()?
        };

        Ok(store)
    }

    /// Root directory of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding backup bundles.
    pub fn backups_path(&self) -> &Path {
        &self.backups_path
    }

    /// Current index snapshot.
    pub fn index(&self) -> &StorageIndex {
        &self.index
    }

    /// Persist one version and keep the index and active snapshot in step.
    ///
    /// Idempotent on identical re-save. Only active versions touch the
    /// `active/` snapshot; deactivation clears it via
    /// [`RuleStore::clear_active_snapshot`].
    pub fn save_rule_version(&mut self, version: &RuleVersion) -> Result<(), StoreError> {
        let version_file = self.version_file(&version.rule_id, &version.version_id);
        write_json(&version_file, version)?;

        self.index.record(version);
        self.persist_index()?;

        if version.is_active {
            write_json(self.active_file(&version.rule_id), version)?;
        }

        debug!(
            rule_id = %version.rule_id,
            version_id = %version.version_id,
            active = version.is_active,
            "saved rule version"
        );
        Ok(())
    }

    /// All versions of one rule, timestamp-ascending.
    ///
    /// Unknown rule ids yield an empty list. Corrupt version files are
    /// logged and skipped; they never abort the rest of the chain.
    pub fn load_rule_versions(&self, rule_id: &str) -> Vec<RuleVersion> {
        let rule_dir = self.versions_path.join(rule_id);
        let mut versions = self.read_version_dir(&rule_dir);
        versions.sort_by_key(|v| v.timestamp);
        versions
    }

    /// Full scan of every version in the store, for startup rehydration.
    pub fn load_all_versions(&self) -> Vec<RuleVersion> {
        let mut all = Vec::new();
        let Ok(entries) = fs::read_dir(&self.versions_path) else {
            return all;
        };
        for entry in entries.filter_map(Result::ok) {
            if entry.path().is_dir() {
                let rule_id = entry.file_name().to_string_lossy().to_string();
                all.extend(self.load_rule_versions(&rule_id));
            }
        }
        debug!(total = all.len(), "loaded all versions from storage");
        all
    }

    /// Point lookup. Absent or unreadable files yield `None`.
    pub fn get_version(&self, rule_id: &str, version_id: &str) -> Option<RuleVersion> {
        let path = self.version_file(rule_id, version_id);
        if !path.exists() {
            return None;
        }
        match read_json(&path) {
            Ok(version) => Some(version),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable version file");
                None
            }
        }
    }

    /// Destructively remove one version, snapshotting it to a timestamped
    /// backup first.
    ///
    /// Returns `Ok(false)` with no side effects when the version is absent.
    pub fn delete_version(&mut self, rule_id: &str, version_id: &str) -> Result<bool, StoreError> {
        let version_file = self.version_file(rule_id, version_id);
        if !version_file.exists() {
            return Ok(false);
        }

        let backup_file = self.backups_path.join(format!(
            "deleted_{rule_id}_{version_id}_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        fs::copy(&version_file, &backup_file).map_err(|e| StoreError::io(&backup_file, e))?;

        fs::remove_file(&version_file).map_err(|e| StoreError::io(&version_file, e))?;

        let was_active = self
            .index
            .rules
            .get(rule_id)
            .and_then(|entry| entry.active_version.as_deref())
            == Some(version_id);
        self.index.remove(rule_id, version_id);
        self.persist_index()?;

        if was_active {
            let active_file = self.active_file(rule_id);
            if active_file.exists() {
                fs::remove_file(&active_file).map_err(|e| StoreError::io(&active_file, e))?;
            }
        }

        debug!(rule_id, version_id, "deleted rule version");
        Ok(true)
    }

    /// The active rule set, read from the `active/` snapshot directory only.
    ///
    /// O(#rules), independent of history depth. This is the pipeline's hot
    /// read path.
    pub fn get_active_rules(&self) -> BTreeMap<String, RuleVersion> {
        let mut active = BTreeMap::new();
        let Ok(entries) = fs::read_dir(&self.active_path) else {
            return active;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<RuleVersion>(&path) {
                Ok(version) => {
                    active.insert(version.rule_id.clone(), version);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable active snapshot");
                }
            }
        }
        active
    }

    /// Remove a rule's active snapshot and index pointer (deactivation).
    pub fn clear_active_snapshot(&mut self, rule_id: &str) -> Result<(), StoreError> {
        let active_file = self.active_file(rule_id);
        if active_file.exists() {
            fs::remove_file(&active_file).map_err(|e| StoreError::io(&active_file, e))?;
        }
        self.index.clear_active(rule_id);
        self.persist_index()
    }

    /// Counts, approximate size, and per-rule distribution of the version
    /// tree. Monitoring only; never fails.
    pub fn storage_statistics(&self) -> StorageStatistics {
        let mut stats = StorageStatistics {
            total_rules: 0,
            total_versions: 0,
            storage_size_bytes: 0,
            rule_distribution: BTreeMap::new(),
            oldest_version: None,
            newest_version: None,
        };

        let Ok(entries) = fs::read_dir(&self.versions_path) else {
            return stats;
        };
        for entry in entries.filter_map(Result::ok) {
            let rule_dir = entry.path();
            if !rule_dir.is_dir() {
                continue;
            }
            stats.total_rules += 1;
            let rule_id = entry.file_name().to_string_lossy().to_string();
            let mut rule_versions = 0usize;

            for version in self.read_version_dir(&rule_dir) {
                rule_versions += 1;
                stats.total_versions += 1;
                let oldest = stats.oldest_version.get_or_insert(version.timestamp);
                if version.timestamp < *oldest {
                    *oldest = version.timestamp;
                }
                let newest = stats.newest_version.get_or_insert(version.timestamp);
                if version.timestamp > *newest {
                    *newest = version.timestamp;
                }
            }
            if let Ok(dir_entries) = fs::read_dir(&rule_dir) {
                for file in dir_entries.filter_map(Result::ok) {
                    if let Ok(meta) = file.metadata() {
                        stats.storage_size_bytes += meta.len();
                    }
                }
            }
            stats.rule_distribution.insert(rule_id, rule_versions);
        }
        stats
    }

    pub(crate) fn version_file(&self, rule_id: &str, version_id: &str) -> PathBuf {
        self.versions_path
            .join(rule_id)
            .join(format!("{version_id}.json"))
    }

    pub(crate) fn active_file(&self, rule_id: &str) -> PathBuf {
        self.active_path.join(format!("{rule_id}.json"))
    }

    pub(crate) fn versions_path(&self) -> &Path {
        &self.versions_path
    }

    pub(crate) fn active_dir(&self) -> &Path {
        &self.active_path
    }

    pub(crate) fn ensure_directories(&self) -> Result<(), StoreError> {
        for dir in [&self.versions_path, &self.active_path, &self.backups_path] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        Ok(())
    }

    pub(crate) fn reset_index(&mut self) -> Result<(), StoreError> {
        self.index = StorageIndex::default();
        self.persist_index()
    }

    fn persist_index(&self) -> Result<(), StoreError> {
        write_json(&self.index_path, &self.index)?;
        Ok(())
    }

    fn rebuild_index(&mut self) -> Result<StorageIndex, StoreError> {
        let mut index = StorageIndex::default();
        for version in self.load_all_versions() {
            index.record(&version);
        }
        write_json(&self.index_path, &index)?;
        Ok(index)
    }

    fn read_version_dir(&self, rule_dir: &Path) -> Vec<RuleVersion> {
        let mut versions = Vec::new();
        let Ok(entries) = fs::read_dir(rule_dir) else {
            return versions;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<RuleVersion>(&path) {
                Ok(version) => versions.push(version),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping corrupt version file");
                }
            }
        }
        versions
    }
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
            "rulevault-store-{prefix}-{}-{unique}",
            std::process::id()
        ))
    }

    fn version(rule_id: &str, version_id: &str, is_active: bool) -> RuleVersion {
        let mut content = RuleContent::new();
        content.set("pattern", json!("A"));
        content.set("replacement", json!("a"));
        RuleVersion {
            version_id: version_id.to_string(),
            rule_id: rule_id.to_string(),
            rule_content: content,
            timestamp: Utc::now(),
            author: "u1".to_string(),
            change_description: "init".to_string(),
            parent_version: None,
            is_active,
            change_type: ChangeType::Creation,
            impact_score: 1.0,
        }
    }

    #[test]
    fn save_then_get_round_trips_all_fields() {
        let base = temp_base("roundtrip");
        let mut store = RuleStore::open(&base).expect("store should open");
        let v = version("r1", "v1", true);

        store.save_rule_version(&v).expect("save should succeed");
        let loaded = store.get_version("r1", "v1").expect("version must exist");
        assert_eq!(loaded, v);

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn unknown_rule_yields_empty_and_none() {
        let base = temp_base("unknown");
        let store = RuleStore::open(&base).expect("store should open");

        assert!(store.load_rule_versions("missing").is_empty());
        assert!(store.get_version("missing", "v1").is_none());

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn active_snapshot_tracks_only_active_versions() {
        let base = temp_base("active");
        let mut store = RuleStore::open(&base).expect("store should open");

        let mut v1 = version("r1", "v1", true);
        store.save_rule_version(&v1).expect("save v1");
        v1.is_active = false;
        store.save_rule_version(&v1).expect("resave v1 inactive");
        let v2 = version("r1", "v2", true);
        store.save_rule_version(&v2).expect("save v2");

        let active = store.get_active_rules();
        assert_eq!(active.len(), 1);
        assert_eq!(
            active.get("r1").expect("r1 must be active").version_id,
            "v2"
        );

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn corrupt_version_file_is_skipped_in_bulk_load() {
        let base = temp_base("corrupt");
        let mut store = RuleStore::open(&base).expect("store should open");
        store
            .save_rule_version(&version("r1", "v1", true))
            .expect("save should succeed");

        fs::write(store.version_file("r1", "vbad"), b"{broken")
            .expect("corrupt fixture should write");

        let versions = store.load_rule_versions("r1");
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_id, "v1");

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn delete_version_backs_up_then_removes() {
        let base = temp_base("delete");
        let mut store = RuleStore::open(&base).expect("store should open");
        store
            .save_rule_version(&version("r1", "v1", true))
            .expect("save should succeed");

        assert!(store.delete_version("r1", "v1").expect("delete should run"));
        assert!(store.get_version("r1", "v1").is_none());
        assert!(store.get_active_rules().is_empty());

        let backups: Vec<_> = fs::read_dir(store.backups_path())
            .expect("backups dir should list")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert!(
            backups.iter().any(|name| name.starts_with("deleted_r1_v1_")),
            "deletion must leave a timestamped backup, got {backups:?}"
        );

        // Absent version: no error, no side effects.
        assert!(!store.delete_version("r1", "v1").expect("second delete should run"));

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn index_rebuilds_from_tree_when_unreadable() {
        let base = temp_base("rebuild");
        {
            let mut store = RuleStore::open(&base).expect("store should open");
            store
                .save_rule_version(&version("r1", "v1", true))
                .expect("save should succeed");
        }
        fs::write(base.join(INDEX_FILE), b"not json").expect("index corruption should write");

        let store = RuleStore::open(&base).expect("store should reopen");
        let entry = store.index().rules.get("r1").expect("entry must exist");
        assert_eq!(entry.versions, vec!["v1".to_string()]);
        assert_eq!(entry.active_version.as_deref(), Some("v1"));

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn statistics_report_counts_and_distribution() {
        let base = temp_base("stats");
        let mut store = RuleStore::open(&base).expect("store should open");
        for (rule, ver) in [("r1", "v1"), ("r1", "v2"), ("r1", "v3"), ("r2", "v4"), ("r2", "v5")] {
            store
                .save_rule_version(&version(rule, ver, false))
                .expect("save should succeed");
        }

        let stats = store.storage_statistics();
        assert_eq!(stats.total_rules, 2);
        assert_eq!(stats.total_versions, 5);
        assert_eq!(stats.rule_distribution.get("r1"), Some(&3));
        assert_eq!(stats.rule_distribution.get("r2"), Some(&2));
        assert!(stats.storage_size_bytes > 0);
        assert!(stats.oldest_version.is_some());
        assert!(stats.newest_version >= stats.oldest_version);

        let _ = fs::remove_dir_all(base);
    }
}
