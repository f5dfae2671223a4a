//! Auto-resolution of detected conflicts.
//!
//! Only `auto_resolvable` conflicts are touched; CRITICAL and otherwise
//! non-resolvable ones are left for a human. Winner selection: higher
//! confidence, then higher priority, then most-recent timestamp. Every
//! decision leaves a human-readable audit entry.

use std::cmp::Ordering;
use tracing::debug;

use crate::types::{Conflict, RuleProfile};

/// Outcome of a resolution pass, with an audit trail of actions.
#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    pub resolved: Vec<Conflict>,
    pub unresolved: Vec<Conflict>,
    pub actions_taken: Vec<String>,
}

/// Apply auto-resolution to every `auto_resolvable` conflict.
pub fn resolve_conflicts(conflicts: Vec<Conflict>) -> ResolutionOutcome {
    let mut outcome = ResolutionOutcome::default();

    for conflict in conflicts {
        if !conflict.auto_resolvable {
            outcome.actions_taken.push(format!(
                "conflict {} ({}) requires manual review",
                conflict.conflict_id,
                conflict.kind.as_str()
            ));
            outcome.unresolved.push(conflict);
            continue;
        }

        match pick_winner(&conflict.first, &conflict.second) {
            Some((winner, loser, basis)) => {
                outcome.actions_taken.push(format!(
                    "conflict {}: keep rule {} ({basis}); demote rule {}",
                    conflict.conflict_id,
                    winner.id_or_unknown(),
                    loser.id_or_unknown()
                ));
                outcome.resolved.push(conflict);
            }
            None => {
                outcome.actions_taken.push(format!(
                    "conflict {}: rules are indistinguishable; escalating to manual review",
                    conflict.conflict_id
                ));
                outcome.unresolved.push(conflict);
            }
        }
    }

    debug!(
        resolved = outcome.resolved.len(),
        unresolved = outcome.unresolved.len(),
        "resolution pass finished"
    );
    outcome
}

/// Preference order: confidence, priority, recency.
fn pick_winner<'a>(
    first: &'a RuleProfile,
    second: &'a RuleProfile,
) -> Option<(&'a RuleProfile, &'a RuleProfile, &'static str)> {
    match first
        .effective_confidence()
        .partial_cmp(&second.effective_confidence())
        .unwrap_or(Ordering::Equal)
    {
        Ordering::Greater => return Some((first, second, "higher confidence")),
        Ordering::Less => return Some((second, first, "higher confidence")),
        Ordering::Equal => {}
    }

    match first.priority.unwrap_or(0).cmp(&second.priority.unwrap_or(0)) {
        Ordering::Greater => return Some((first, second, "higher priority")),
        Ordering::Less => return Some((second, first, "higher priority")),
        Ordering::Equal => {}
    }

    match (first.timestamp, second.timestamp) {
        (Some(a), Some(b)) if a > b => Some((first, second, "more recent")),
        (Some(a), Some(b)) if b > a => Some((second, first, "more recent")),
        (Some(_), None) => Some((first, second, "more recent")),
        (None, Some(_)) => Some((second, first, "more recent")),
        _ => None,
    }
}
