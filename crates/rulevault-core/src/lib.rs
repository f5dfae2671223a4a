//! # rulevault-core
//!
//! Data model for the rulevault versioned rule store.
//!
//! This crate provides:
//! - `RuleContent` (opaque rule payload with typed accessors)
//! - `RuleVersion` and `ChangeType` (the audit chain node)
//! - content-addressed version-id derivation
//!
//! It intentionally does not persist anything or analyze rules. Those
//! concerns live in `rulevault-store` and `rulevault-conflict`.

pub mod content;
pub mod hash;
pub mod version;

pub use content::{
    DEACTIVATED_KEY, DEACTIVATION_REASON_KEY, DEFAULT_CONFIDENCE, RuleContent,
};
pub use hash::{VERSION_ID_LEN, version_id};
pub use version::{ChangeType, RuleVersion};
