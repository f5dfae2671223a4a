//! # rulevault-store
//!
//! Durable layer for rule versions.
//!
//! This crate provides:
//! - `RuleStore` (per-version JSON files, active snapshots, index, backups)
//! - `VersionManager` (chain lifecycle: create, rollback, deactivate)
//! - storage and version statistics
//!
//! ## Data model
//!
//! ```text
//! rule_versions/<rule>/<version>.json (append-only history)
//!     ↕  hydrate / persist
//! VersionManager chains (deterministic in-memory projection)
//!     →  active/<rule>.json (O(#rules) hot read path)
//! ```
//!
//! Writes fail loud; reads degrade gracefully. Conflict analysis lives in
//! `rulevault-conflict` and never touches this crate's state.

pub mod backup;
pub mod impact;
pub mod index;
pub mod json_file;
pub mod manager;
pub mod storage;

pub use backup::{BackupBundle, RestoreOutcome};
pub use impact::impact_score;
pub use index::{RuleIndexEntry, StorageIndex};
pub use json_file::{JsonFileError, read_json, write_json};
pub use manager::{RecentChange, VersionManager, VersionStatistics};
pub use storage::{RuleStore, StorageStatistics, StoreError};
