//! Change-impact scoring.
//!
//! Heuristic estimate of how structurally significant a change is, in
//! `[0.1, 1.0]`. Indicators are averaged, not summed, so the score ranks
//! the kind of change rather than counting touched fields.

use rulevault_core::RuleContent;

const PATTERN_WEIGHT: f64 = 0.8;
const REPLACEMENT_WEIGHT: f64 = 0.6;
const CONFIDENCE_WEIGHT: f64 = 0.4;
const PRIORITY_WEIGHT: f64 = 0.3;

/// Confidence shifts below this are treated as noise.
const CONFIDENCE_DELTA_THRESHOLD: f64 = 0.2;

/// Floor for any modification, even a pure-metadata touch.
const MIN_IMPACT: f64 = 0.1;

/// Score a change against its parent content.
///
/// A brand-new rule (no parent) always scores 1.0. Otherwise the score is
/// the mean of the triggered indicators: pattern change (0.8), replacement
/// change (0.6), confidence shift > 0.2 absolute (0.4), priority change
/// (0.3), floored at 0.1 when nothing triggered.
pub fn impact_score(content: &RuleContent, parent: Option<&RuleContent>) -> f64 {
    let Some(parent) = parent else {
        return 1.0;
    };

    let mut factors = Vec::new();
    if content.pattern() != parent.pattern() {
        factors.push(PATTERN_WEIGHT);
    }
    if content.replacement() != parent.replacement() {
        factors.push(REPLACEMENT_WEIGHT);
    }
    if (content.confidence() - parent.confidence()).abs() > CONFIDENCE_DELTA_THRESHOLD {
        factors.push(CONFIDENCE_WEIGHT);
    }
    if content.priority() != parent.priority() {
        factors.push(PRIORITY_WEIGHT);
    }

    if factors.is_empty() {
        MIN_IMPACT
    } else {
        let mean = factors.iter().sum::<f64>() / factors.len() as f64;
        mean.max(MIN_IMPACT)
    }
}
