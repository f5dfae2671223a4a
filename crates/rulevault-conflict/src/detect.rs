//! Conflict detection.
//!
//! Pure function over a candidate rule and the active rule set. Detection
//! never errors for well-typed input: an uncompilable candidate pattern is
//! itself the finding (one CRITICAL [`ConflictKind::RegexConflict`]), and
//! an active rule whose stored pattern no longer compiles is skipped with
//! a warning.
//!
//! Overlap strategy (general regex equivalence is undecidable, so this is
//! deliberately approximate and recall-oriented): each pattern is run
//! case-insensitively over the fixed [`PROBE_CORPUS`]; the overlap ratio is
//! the fraction of probes both patterns match. False positives are
//! preferred over silent ambiguity: borderline overlaps are flagged for
//! human review rather than suppressed. Only rules of the same `rule_type`
//! are compared for overlap; cross-type overlap is intentional layering,
//! not a conflict. Circular-dependency checks ignore the type gate, since
//! every rule fires in the same pipeline pass.

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::types::{Conflict, ConflictKind, RuleProfile, Severity};

/// Fixed probe strings for overlap estimation.
///
/// Mixed entity-name samples shaped like the enrichment pipeline's input:
/// corporate suffixes, punctuation, digits, units.
pub const PROBE_CORPUS: &[&str] = &[
    "ACME CORP",
    "GLOBEX CORPORATION",
    "INITECH LLC",
    "UMBRELLA CO.",
    "STARK INDUSTRIES 500 KG",
    "WAYNE ENTERPRISES LTD",
    "42 WALLABY WAY UNIT 7",
    "CONTOSO HOLDINGS",
];

/// Overlap ratio above which a pattern pair is flagged.
const OVERLAP_FLAG_THRESHOLD: f64 = 0.3;
/// Overlap ratio above which the flag escalates to HIGH.
const OVERLAP_HIGH_THRESHOLD: f64 = 0.7;
/// Overlap ratio below which the flag is still auto-resolvable.
const OVERLAP_AUTO_THRESHOLD: f64 = 0.5;

/// Pattern similarity above which priorities are expected to align.
const PRIORITY_SIMILARITY_THRESHOLD: f64 = 0.7;
/// Priority gap that flags near-identical patterns.
const PRIORITY_GAP_THRESHOLD: i64 = 3;

/// Active-set size past which complex candidate patterns are flagged.
const PERFORMANCE_RULE_COUNT: usize = 50;
/// Candidate pattern length (chars) considered complex.
const PERFORMANCE_PATTERN_LEN: usize = 100;

/// Detect conflicts between a candidate and the existing active rules.
///
/// An invalid candidate pattern short-circuits: the result is exactly one
/// CRITICAL regex conflict, regardless of the existing set (including
/// empty).
pub fn detect_conflicts(candidate: &RuleProfile, existing: &[RuleProfile]) -> Vec<Conflict> {
    let candidate_regex = match compile(&candidate.pattern) {
        Ok(regex) => regex,
        Err(err) => return vec![regex_conflict(candidate, &err)],
    };

    let mut conflicts = Vec::new();
    for other in existing {
        let Ok(other_regex) = compile(&other.pattern) else {
            warn!(
                rule_id = other.id_or_unknown(),
                "active rule pattern no longer compiles; skipping comparison"
            );
            continue;
        };

        // Replacement loops cross rule_type boundaries (every rule fires in
        // the same pipeline pass), so this check precedes the same-type gate.
        if let Some(conflict) =
            circular_conflict(candidate, other, &candidate_regex, &other_regex)
        {
            conflicts.push(conflict);
            continue;
        }
        if candidate.rule_type != other.rule_type {
            continue;
        }

        if let Some(conflict) = priority_conflict(candidate, other) {
            conflicts.push(conflict);
        }

        if normalize_pattern(&candidate.pattern) == normalize_pattern(&other.pattern) {
            conflicts.push(same_pattern_conflict(candidate, other));
            continue;
        }

        if let Some(conflict) =
            overlap_conflict(candidate, other, &candidate_regex, &other_regex)
        {
            conflicts.push(conflict);
        }
    }

    if let Some(conflict) = performance_conflict(candidate, existing.len()) {
        conflicts.push(conflict);
    }

    debug!(total = conflicts.len(), "conflict detection finished");
    conflicts
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Comparison key for "effectively identical" patterns: whitespace-trimmed,
/// anchors stripped, lowercased.
fn normalize_pattern(pattern: &str) -> String {
    pattern
        .trim()
        .trim_start_matches('^')
        .trim_end_matches('$')
        .to_lowercase()
}

/// Positional character overlap of two patterns, in `[0, 1]`. Crude, but
/// catches the copy-edit case where one pattern is a near-duplicate of
/// another.
fn pattern_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let longer = a.chars().count().max(b.chars().count());
    let common = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    common as f64 / longer as f64
}

fn regex_conflict(candidate: &RuleProfile, err: &regex::Error) -> Conflict {
    let mut conflict = Conflict::new(
        ConflictKind::RegexConflict,
        Severity::Critical,
        candidate.clone(),
        RuleProfile::system(),
    );
    conflict.description = format!("Invalid regex pattern: {err}");
    conflict.suggested_resolution = "Fix regex syntax errors before activation".to_string();
    conflict.impact_assessment = "Rule would fail on every input".to_string();
    conflict.auto_resolvable = false;
    conflict
}

fn circular_conflict(
    candidate: &RuleProfile,
    other: &RuleProfile,
    candidate_regex: &Regex,
    other_regex: &Regex,
) -> Option<Conflict> {
    if candidate.replacement.is_empty()
        || other.replacement.is_empty()
        || !other_regex.is_match(&candidate.replacement)
        || !candidate_regex.is_match(&other.replacement)
    {
        return None;
    }

    let mut conflict = Conflict::new(
        ConflictKind::CircularDependency,
        Severity::Critical,
        candidate.clone(),
        other.clone(),
    );
    conflict.description = format!(
        "Replacement {:?} re-triggers rule {} and vice versa",
        candidate.replacement,
        other.id_or_unknown()
    );
    conflict.suggested_resolution =
        "Modify one pattern or replacement to break the cycle".to_string();
    conflict.impact_assessment = "Could cause infinite replacement loops".to_string();
    conflict.auto_resolvable = false;
    Some(conflict)
}

fn priority_conflict(candidate: &RuleProfile, other: &RuleProfile) -> Option<Conflict> {
    let candidate_priority = candidate.priority.unwrap_or(0);
    let other_priority = other.priority.unwrap_or(0);
    if (candidate_priority - other_priority).abs() <= PRIORITY_GAP_THRESHOLD
        || pattern_similarity(&candidate.pattern, &other.pattern) <= PRIORITY_SIMILARITY_THRESHOLD
    {
        return None;
    }

    let mut conflict = Conflict::new(
        ConflictKind::PriorityConflict,
        Severity::Medium,
        candidate.clone(),
        other.clone(),
    );
    conflict.description = format!(
        "Similar patterns with very different priorities ({candidate_priority} vs {other_priority})"
    );
    conflict.suggested_resolution = "Review and align priorities".to_string();
    conflict.impact_assessment = "Rule application order becomes inconsistent".to_string();
    conflict.auto_resolvable = true;
    Some(conflict)
}

fn performance_conflict(candidate: &RuleProfile, existing_count: usize) -> Option<Conflict> {
    if existing_count <= PERFORMANCE_RULE_COUNT
        || candidate.pattern.chars().count() <= PERFORMANCE_PATTERN_LEN
    {
        return None;
    }

    let mut conflict = Conflict::new(
        ConflictKind::PerformanceImpact,
        Severity::Medium,
        candidate.clone(),
        RuleProfile::system(),
    );
    conflict.description = format!(
        "Complex pattern against {existing_count} existing rules may impact scan cost"
    );
    conflict.suggested_resolution =
        "Simplify the pattern or consolidate with existing rules".to_string();
    conflict.impact_assessment = "May slow down processing on large inputs".to_string();
    conflict.auto_resolvable = false;
    Some(conflict)
}

fn same_pattern_conflict(candidate: &RuleProfile, other: &RuleProfile) -> Conflict {
    if candidate.replacement != other.replacement {
        let mut conflict = Conflict::new(
            ConflictKind::ReplacementAmbiguity,
            Severity::High,
            candidate.clone(),
            other.clone(),
        );
        conflict.description = format!(
            "Same pattern with different replacements ({:?} vs {:?})",
            candidate.replacement, other.replacement
        );
        conflict.suggested_resolution =
            "Keep the higher-confidence rule or merge into a single rule".to_string();
        conflict.impact_assessment =
            "Evaluation order would silently change output".to_string();
        conflict.auto_resolvable = true;
        conflict
    } else {
        let mut conflict = Conflict::new(
            ConflictKind::PatternOverlap,
            Severity::Low,
            candidate.clone(),
            other.clone(),
        );
        conflict.description = "Duplicate pattern with identical replacement".to_string();
        conflict.suggested_resolution = "Drop the redundant rule".to_string();
        conflict.impact_assessment = "Redundant work per input, no output change".to_string();
        conflict.auto_resolvable = true;
        conflict
    }
}

fn overlap_conflict(
    candidate: &RuleProfile,
    other: &RuleProfile,
    candidate_regex: &Regex,
    other_regex: &Regex,
) -> Option<Conflict> {
    let both = PROBE_CORPUS
        .iter()
        .filter(|probe| candidate_regex.is_match(probe) && other_regex.is_match(probe))
        .count();
    let ratio = both as f64 / PROBE_CORPUS.len() as f64;
    if ratio <= OVERLAP_FLAG_THRESHOLD {
        return None;
    }

    let severity = if ratio > OVERLAP_HIGH_THRESHOLD {
        Severity::High
    } else {
        Severity::Medium
    };
    let mut conflict = Conflict::new(
        ConflictKind::PatternOverlap,
        severity,
        candidate.clone(),
        other.clone(),
    );
    conflict.description = format!("Patterns overlap on {:.0}% of probe inputs", ratio * 100.0);
    conflict.suggested_resolution =
        "Narrow one pattern or merge the rules".to_string();
    conflict.impact_assessment = format!(
        "Both rules would fire on roughly {:.0}% of shared inputs",
        ratio * 100.0
    );
    conflict.auto_resolvable = ratio < OVERLAP_AUTO_THRESHOLD;
    Some(conflict)
}
