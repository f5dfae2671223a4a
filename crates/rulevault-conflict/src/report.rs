//! Conflict report aggregation.
//!
//! Pure formatting over an already-detected conflict list; no new
//! detection happens here.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Conflict, ConflictKind, SYSTEM_RULE_ID, Severity};

/// Overall risk carried by a conflict set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How much human effort resolution will take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionComplexity {
    Low,
    High,
}

/// Count breakdown of a conflict set.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub auto_resolvable: usize,
}

/// Aggregate consequences of a conflict set.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactAnalysis {
    pub risk_level: RiskLevel,
    pub affected_rules: usize,
    pub resolution_complexity: ResolutionComplexity,
}

/// Human-facing report over one detection pass.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub summary: ConflictSummary,
    pub critical_conflicts: Vec<Conflict>,
    pub recommendations: Vec<String>,
    pub impact_analysis: ImpactAnalysis,
}

/// Aggregate a detection result into a report.
pub fn conflict_report(conflicts: &[Conflict]) -> ConflictReport {
    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut auto_resolvable = 0usize;
    let mut affected: BTreeSet<String> = BTreeSet::new();

    for conflict in conflicts {
        *by_severity
            .entry(conflict.severity.as_str().to_string())
            .or_default() += 1;
        *by_type
            .entry(conflict.kind.as_str().to_string())
            .or_default() += 1;
        if conflict.auto_resolvable {
            auto_resolvable += 1;
        }
        for id in conflict.involved_rule_ids() {
            if id != SYSTEM_RULE_ID {
                affected.insert(id.to_string());
            }
        }
    }

    let critical_conflicts: Vec<Conflict> = conflicts
        .iter()
        .filter(|c| c.severity == Severity::Critical)
        .cloned()
        .collect();

    let risk_level = if !critical_conflicts.is_empty() {
        RiskLevel::High
    } else if conflicts.iter().any(|c| c.severity >= Severity::High) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    let resolution_complexity = if conflicts.iter().any(|c| !c.auto_resolvable) {
        ResolutionComplexity::High
    } else {
        ResolutionComplexity::Low
    };

    ConflictReport {
        summary: ConflictSummary {
            total: conflicts.len(),
            by_severity,
            by_type,
            auto_resolvable,
        },
        recommendations: recommendations(conflicts, auto_resolvable),
        critical_conflicts,
        impact_analysis: ImpactAnalysis {
            risk_level,
            affected_rules: affected.len(),
            resolution_complexity,
        },
    }
}

fn recommendations(conflicts: &[Conflict], auto_resolvable: usize) -> Vec<String> {
    let mut out = Vec::new();

    if conflicts.iter().any(|c| c.severity == Severity::Critical) {
        out.push("Address critical conflicts before activating the candidate".to_string());
    }

    let overlaps = conflicts
        .iter()
        .filter(|c| c.kind == ConflictKind::PatternOverlap)
        .count();
    if overlaps > 3 {
        out.push("Consider consolidating overlapping patterns into broader rules".to_string());
    }

    if conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::CircularDependency)
    {
        out.push("Review rule dependencies to prevent infinite replacement loops".to_string());
    }

    if auto_resolvable > 0 {
        out.push(format!(
            "{auto_resolvable} conflict(s) can be auto-resolved"
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_conflicts;
    use crate::types::RuleProfile;

    fn profile(id: &str, pattern: &str, replacement: &str) -> RuleProfile {
        RuleProfile {
            id: Some(id.to_string()),
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            rule_type: Some("normalization".to_string()),
            confidence: None,
            priority: None,
            timestamp: None,
        }
    }

    #[test]
    fn empty_set_reports_low_risk() {
        let report = conflict_report(&[]);
        assert_eq!(report.summary.total, 0);
        assert_eq!(report.impact_analysis.risk_level, RiskLevel::Low);
        assert_eq!(
            report.impact_analysis.resolution_complexity,
            ResolutionComplexity::Low
        );
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn critical_conflicts_drive_high_risk_and_recommendations() {
        let candidate = profile("r-new", "[broken", "x");
        let conflicts = detect_conflicts(&candidate, &[]);

        let report = conflict_report(&conflicts);
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.by_severity.get("critical"), Some(&1));
        assert_eq!(report.summary.by_type.get("regex_conflict"), Some(&1));
        assert_eq!(report.critical_conflicts.len(), 1);
        assert_eq!(
            report.impact_analysis.affected_rules, 1,
            "the system marker must not count as an affected rule"
        );
        assert_eq!(report.impact_analysis.risk_level, RiskLevel::High);
        assert_eq!(
            report.impact_analysis.resolution_complexity,
            ResolutionComplexity::High
        );
        assert!(report.recommendations[0].contains("critical"));
    }

    #[test]
    fn circular_dependency_recommends_breaking_the_loop() {
        let candidate = profile("r-new", "\\bA\\b", "B");
        let existing = vec![profile("r1", "\\bB\\b", "A")];
        let conflicts = detect_conflicts(&candidate, &existing);

        let report = conflict_report(&conflicts);
        assert_eq!(report.summary.by_type.get("circular_dependency"), Some(&1));
        assert_eq!(report.impact_analysis.risk_level, RiskLevel::High);
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("infinite replacement loops")),
            "recommendations: {:?}",
            report.recommendations
        );
    }

    #[test]
    fn ambiguity_reports_medium_risk_and_auto_count() {
        let candidate = profile("r-new", "\\bCORP\\b", "CORPORATION");
        let existing = vec![profile("r1", "\\bCORP\\b", "COMPANY")];
        let conflicts = detect_conflicts(&candidate, &existing);

        let report = conflict_report(&conflicts);
        assert_eq!(report.summary.auto_resolvable, 1);
        assert_eq!(report.impact_analysis.risk_level, RiskLevel::Medium);
        assert_eq!(report.impact_analysis.affected_rules, 2);
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("auto-resolved")),
            "recommendations: {:?}",
            report.recommendations
        );
    }
}
