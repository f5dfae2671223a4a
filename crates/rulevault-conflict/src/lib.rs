//! # rulevault-conflict
//!
//! Stateless pre-activation conflict analysis.
//!
//! This crate provides:
//! - `detect_conflicts` (candidate vs. active rule set)
//! - `resolve_conflicts` (auto-resolution with an audit trail)
//! - `conflict_report` (aggregation for humans and dashboards)
//!
//! Pure functions over snapshots: no persistent state, no storage
//! coupling. The intended flow is
//! `detect_conflicts(candidate, &active)` before
//! `VersionManager::create_version`, blocking activation while
//! non-resolvable conflicts remain.

pub mod detect;
pub mod report;
pub mod resolve;
pub mod types;

pub use detect::{PROBE_CORPUS, detect_conflicts};
pub use report::{
    ConflictReport, ConflictSummary, ImpactAnalysis, ResolutionComplexity, RiskLevel,
    conflict_report,
};
pub use resolve::{ResolutionOutcome, resolve_conflicts};
pub use types::{Conflict, ConflictKind, RuleProfile, SYSTEM_RULE_ID, Severity};
