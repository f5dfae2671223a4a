//! Version lifecycle manager.
//!
//! Canonical in-memory projection of every rule's version chain, layered on
//! [`RuleStore`]. This is the sole write path: callers never touch storage
//! directly, so the single-active-version invariant is enforced in one
//! place.
//!
//! Concurrency model: a `Mutex<RuleStore>` serializes every mutating
//! operation (writes are human/automation-paced), while chain reads go
//! through an `RwLock` and never wait on disk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use rulevault_core::{ChangeType, RuleContent, RuleVersion, version_id};

use crate::backup::RestoreOutcome;
use crate::impact::impact_score;
use crate::storage::{RuleStore, StorageStatistics, StoreError};

/// Summary of version activity, for monitoring only.
#[derive(Debug, Clone, Serialize)]
pub struct VersionStatistics {
    pub total_rules: usize,
    pub total_versions: usize,
    pub active_rules: usize,
    pub change_types: BTreeMap<String, usize>,
    pub authors: BTreeMap<String, usize>,
    pub recent_changes: Vec<RecentChange>,
}

/// One entry in the recent-changes feed.
#[derive(Debug, Clone, Serialize)]
pub struct RecentChange {
    pub rule_id: String,
    pub version_id: String,
    pub author: String,
    pub change_type: ChangeType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle manager for rule version chains.
#[derive(Debug)]
pub struct VersionManager {
    store: Mutex<RuleStore>,
    chains: RwLock<BTreeMap<String, Vec<RuleVersion>>>,
}

impl VersionManager {
    /// Open the store at `base` and rehydrate every chain from disk.
    ///
    /// Chains are sorted by timestamp; corrupt version files were already
    /// skipped by the storage layer.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = RuleStore::open(base)?;
        let mut chains: BTreeMap<String, Vec<RuleVersion>> = BTreeMap::new();
        for version in store.load_all_versions() {
            chains.entry(version.rule_id.clone()).or_default().push(version);
        }
        for chain in chains.values_mut() {
            chain.sort_by_key(|v| v.timestamp);
        }
        info!(rules = chains.len(), "loaded version history");
        Ok(Self {
            store: Mutex::new(store),
            chains: RwLock::new(chains),
        })
    }

    /// Append a new version to a rule's chain and make it the active one.
    ///
    /// The version id is a stable hash of `(rule_id, canonical content,
    /// now)`; re-submitting a byte-identical version that hashed to an id
    /// the chain already holds is a no-op returning that id. On any
    /// persistence failure the previous active version stays active and the
    /// in-memory chain is untouched.
    pub fn create_version(
        &self,
        rule_id: &str,
        rule_content: RuleContent,
        author: &str,
        description: &str,
        change_type: ChangeType,
    ) -> Result<String, StoreError> {
        let mut store = self.lock_store();
        let now = Utc::now();
        let new_id = version_id(rule_id, &rule_content, now);

        if self.find_version(rule_id, &new_id).is_some() {
            warn!(rule_id, version_id = %new_id, "version already exists; treating as re-submission");
            return Ok(new_id);
        }

        let parent = self.current_version_of(rule_id);
        let impact = impact_score(
            &rule_content,
            parent.as_ref().map(|p| &p.rule_content),
        );

        let version = RuleVersion {
            version_id: new_id.clone(),
            rule_id: rule_id.to_string(),
            rule_content,
            timestamp: now,
            author: author.to_string(),
            change_description: description.to_string(),
            parent_version: parent.as_ref().map(|p| p.version_id.clone()),
            is_active: true,
            change_type,
            impact_score: impact,
        };

        self.persist_supersession(&mut store, parent, &version)?;
        self.append_to_chain(version);

        info!(rule_id, version_id = %new_id, change_type = change_type.as_str(), "created version");
        Ok(new_id)
    }

    /// Roll a rule back to an earlier version's content.
    ///
    /// Forward-only: the target is never resurrected in place. A new
    /// version is appended copying the target's content verbatim, with the
    /// previously-active version as parent. Returns `Ok(false)` when the
    /// target is unknown.
    pub fn rollback_to_version(
        &self,
        rule_id: &str,
        target_version_id: &str,
        author: &str,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let Some(target) = self.find_version(rule_id, target_version_id) else {
            warn!(rule_id, target_version_id, "rollback target not found");
            return Ok(false);
        };

        let description = format!("Rollback to version {target_version_id}: {reason}");
        let new_id = self.create_version(
            rule_id,
            target.rule_content,
            author,
            &description,
            ChangeType::Rollback,
        )?;

        info!(rule_id, target_version_id, new_version = %new_id, "rolled back rule");
        Ok(true)
    }

    /// Retire a rule from the active set without losing its history.
    ///
    /// Appends one retirement version carrying the `_deactivated` sentinel
    /// (itself inactive) and clears the active snapshot, so the rule
    /// disappears from [`VersionManager::get_all_active_rules`]. Returns
    /// `Ok(false)` when the rule has no active version. Reactivation is
    /// just another `create_version`.
    pub fn deactivate_rule(
        &self,
        rule_id: &str,
        author: &str,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let mut store = self.lock_store();
        let Some(current) = self.current_version_of(rule_id) else {
            warn!(rule_id, "no active version to deactivate");
            return Ok(false);
        };

        let now = Utc::now();
        let content = current.rule_content.retired(reason);
        let impact = impact_score(&content, Some(&current.rule_content));
        let retirement = RuleVersion {
            version_id: version_id(rule_id, &content, now),
            rule_id: rule_id.to_string(),
            impact_score: impact,
            rule_content: content,
            timestamp: now,
            author: author.to_string(),
            change_description: format!("Deactivated: {reason}"),
            parent_version: Some(current.version_id.clone()),
            is_active: false,
            change_type: ChangeType::Deactivation,
        };

        // Snapshot first: a failure here leaves everything untouched, and
        // any failure below restores it by re-saving the prior version.
        store.clear_active_snapshot(rule_id)?;

        let mut prior = current;
        prior.is_active = false;
        let persisted = store
            .save_rule_version(&prior)
            .and_then(|()| store.save_rule_version(&retirement));
        if let Err(err) = persisted {
            prior.is_active = true;
            if let Err(inner) = store.save_rule_version(&prior) {
                warn!(rule_id, error = %inner, "failed to unwind partial deactivation");
            }
            return Err(err);
        }

        {
            let mut chains = self.write_chains();
            if let Some(chain) = chains.get_mut(rule_id) {
                if let Some(node) = chain.iter_mut().find(|v| v.version_id == prior.version_id) {
                    node.is_active = false;
                }
                chain.push(retirement);
            }
        }

        info!(rule_id, "deactivated rule");
        Ok(true)
    }

    /// One specific version, by id. Pure in-memory read.
    pub fn get_version(&self, rule_id: &str, version_id: &str) -> Option<RuleVersion> {
        self.find_version(rule_id, version_id)
    }

    /// The currently active version of a rule, if any.
    pub fn get_current_version(&self, rule_id: &str) -> Option<RuleVersion> {
        self.current_version_of(rule_id)
    }

    /// Complete chain for a rule, timestamp-ascending. Empty for unknown ids.
    pub fn get_version_history(&self, rule_id: &str) -> Vec<RuleVersion> {
        self.read_chains().get(rule_id).cloned().unwrap_or_default()
    }

    /// Every rule's active version. At most one entry per rule id.
    pub fn get_all_active_rules(&self) -> BTreeMap<String, RuleVersion> {
        let chains = self.read_chains();
        let mut active = BTreeMap::new();
        for (rule_id, chain) in chains.iter() {
            if let Some(current) = chain.iter().rev().find(|v| v.is_active) {
                active.insert(rule_id.clone(), current.clone());
            }
        }
        active
    }

    /// Counts by change type and author, plus the 10 most recent changes.
    pub fn version_statistics(&self) -> VersionStatistics {
        let chains = self.read_chains();

        let mut change_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut authors: BTreeMap<String, usize> = BTreeMap::new();
        let mut all: Vec<&RuleVersion> = Vec::new();
        let mut active_rules = 0usize;

        for chain in chains.values() {
            if chain.iter().any(|v| v.is_active) {
                active_rules += 1;
            }
            for version in chain {
                *change_types
                    .entry(version.change_type.as_str().to_string())
                    .or_default() += 1;
                *authors.entry(version.author.clone()).or_default() += 1;
                all.push(version);
            }
        }

        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let recent_changes = all
            .iter()
            .take(10)
            .map(|v| RecentChange {
                rule_id: v.rule_id.clone(),
                version_id: v.version_id.clone(),
                author: v.author.clone(),
                change_type: v.change_type,
                description: v.change_description.clone(),
                timestamp: v.timestamp,
            })
            .collect();

        VersionStatistics {
            total_rules: chains.len(),
            total_versions: chains.values().map(Vec::len).sum(),
            active_rules,
            change_types,
            authors,
            recent_changes,
        }
    }

    /// Storage-level counts and sizes (delegates to the durable layer).
    pub fn storage_statistics(&self) -> StorageStatistics {
        self.lock_store().storage_statistics()
    }

    /// Bundle every version into a timestamped backup. See
    /// [`RuleStore::create_backup`].
    pub fn create_backup(&self, name: Option<&str>) -> Result<PathBuf, StoreError> {
        self.lock_store().create_backup(name)
    }

    /// Destructively restore from a bundle, then rehydrate every chain.
    pub fn restore_from_backup(
        &self,
        backup: impl AsRef<Path>,
    ) -> Result<RestoreOutcome, StoreError> {
        let mut store = self.lock_store();
        let outcome = store.restore_from_backup(backup)?;

        let mut chains: BTreeMap<String, Vec<RuleVersion>> = BTreeMap::new();
        for version in store.load_all_versions() {
            chains.entry(version.rule_id.clone()).or_default().push(version);
        }
        for chain in chains.values_mut() {
            chain.sort_by_key(|v| v.timestamp);
        }
        *self.write_chains() = chains;

        Ok(outcome)
    }

    /// Remove one version from disk (backed up first) and from its chain.
    ///
    /// Returns `Ok(false)` with no side effects when the version is absent.
    pub fn delete_version(&self, rule_id: &str, version_id: &str) -> Result<bool, StoreError> {
        let mut store = self.lock_store();
        if !store.delete_version(rule_id, version_id)? {
            return Ok(false);
        }

        let mut chains = self.write_chains();
        if let Some(chain) = chains.get_mut(rule_id) {
            chain.retain(|v| v.version_id != version_id);
            if chain.is_empty() {
                chains.remove(rule_id);
            }
        }
        Ok(true)
    }

    /// Persist a supersession: the new version first (so the active
    /// snapshot flips atomically), then the parent's deactivation. If the
    /// parent flip fails the new version is rolled off disk, leaving the
    /// parent active.
    fn persist_supersession(
        &self,
        store: &mut MutexGuard<'_, RuleStore>,
        parent: Option<RuleVersion>,
        version: &RuleVersion,
    ) -> Result<(), StoreError> {
        store.save_rule_version(version)?;

        if let Some(mut parent) = parent {
            parent.is_active = false;
            if let Err(err) = store.save_rule_version(&parent) {
                // Compensate: keep the chain's previous head active.
                parent.is_active = true;
                let rolled_back = store
                    .save_rule_version(&parent)
                    .and_then(|()| store.delete_version(&version.rule_id, &version.version_id));
                if let Err(inner) = rolled_back {
                    warn!(
                        rule_id = %version.rule_id,
                        error = %inner,
                        "failed to unwind partial supersession"
                    );
                }
                return Err(err);
            }
            let mut chains = self.write_chains();
            if let Some(chain) = chains.get_mut(&parent.rule_id)
                && let Some(node) = chain.iter_mut().find(|v| v.version_id == parent.version_id)
            {
                node.is_active = false;
            }
        }
        Ok(())
    }

    fn append_to_chain(&self, version: RuleVersion) {
        self.write_chains()
            .entry(version.rule_id.clone())
            .or_default()
            .push(version);
    }

    fn find_version(&self, rule_id: &str, version_id: &str) -> Option<RuleVersion> {
        self.read_chains()
            .get(rule_id)?
            .iter()
            .find(|v| v.version_id == version_id)
            .cloned()
    }

    fn current_version_of(&self, rule_id: &str) -> Option<RuleVersion> {
        self.read_chains()
            .get(rule_id)?
            .iter()
            .rev()
            .find(|v| v.is_active)
            .cloned()
    }

    fn lock_store(&self) -> MutexGuard<'_, RuleStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_chains(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<RuleVersion>>> {
        self.chains.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_chains(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<RuleVersion>>> {
        self.chains.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
