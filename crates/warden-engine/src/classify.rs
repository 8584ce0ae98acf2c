//! Threat classification and the confidence model.
//!
//! Classification is a pure function of the score breakdown, the breakpoint
//! table, and cross-analyzer agreement. Confidence measures how many
//! independent evidence sources (patterns, heuristics, structure) agree,
//! out of those that could be evaluated:
//!
//! - all agreeing sources and no degradation: high confidence
//! - evidence only from a decoded payload: scaled down, since decoded
//!   matches carry more false-positive risk than literal ones
//! - degraded input (stripped controls, skipped analyzer): scaled down and,
//!   below the configured floor, escalated fail-closed so mangled input is
//!   never silently allowed
//!
//! Escalation only ever raises the action; it never lowers one.

use crate::config::EngineConfig;
use crate::heuristics::HeuristicReport;
use crate::models::{PolicyAction, ThreatLevel};
use crate::patterns::CategoryMatches;
use crate::scoring::ScoreBreakdown;
use crate::structural::{StructuralReport, OBFUSCATION_PENALTY};

/// Confidence multiplier applied when the input was degraded.
const DEGRADED_PENALTY: f64 = 0.8;

/// Classifier output, folded into the final detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Threat level from the breakpoint table.
    pub threat_level: ThreatLevel,
    /// Evidence-agreement confidence, `[0, 1]`.
    pub confidence: f64,
    /// Recommended action for the caller, after fail-closed escalation.
    pub action: PolicyAction,
    /// Human-readable account of what drove the verdict.
    pub explanation: String,
}

/// Baseline action for a threat level, before fail-closed escalation.
fn action_for(level: ThreatLevel) -> PolicyAction {
    match level {
        ThreatLevel::Safe => PolicyAction::Allow,
        ThreatLevel::Low => PolicyAction::Monitor,
        ThreatLevel::Medium => PolicyAction::SanitizeThenAllow,
        ThreatLevel::High | ThreatLevel::Critical => PolicyAction::Reject,
    }
}

/// Classify one scored input.
///
/// `pattern_matches` holds only literal rule hits; `merged` additionally
/// contains structural findings and is the basis for the explanation. The
/// distinction matters for confidence: a verdict resting solely on decoded
/// or structural evidence is weaker than one with a literal match.
#[must_use]
pub fn classify(
    config: &EngineConfig,
    breakdown: &ScoreBreakdown,
    pattern_matches: &CategoryMatches,
    merged: &CategoryMatches,
    heuristics: &HeuristicReport,
    structural: &StructuralReport,
    degraded: bool,
) -> Classification {
    let threat_level = config.breakpoints.level_for(breakdown.risk_score);

    let pattern_agrees = pattern_matches.values().any(|hits| !hits.is_empty());
    let heuristic_agrees = heuristics.is_elevated();
    let structural_agrees = !structural.is_empty();

    // A source is available when it could be evaluated at all; heuristics
    // drop out only if every signal was excluded.
    let heuristic_available = heuristics.excluded < 5;
    let available = 2 + usize::from(heuristic_available);
    let agreeing = usize::from(pattern_agrees)
        + usize::from(heuristic_agrees && heuristic_available)
        + usize::from(structural_agrees);

    let mut confidence = if agreeing == 0 {
        // nothing fired: confidently safe
        1.0
    } else {
        agreeing as f64 / available as f64
    };
    if structural.decoded_obfuscation && !pattern_agrees {
        confidence *= OBFUSCATION_PENALTY;
    }
    if degraded {
        confidence *= DEGRADED_PENALTY;
    }

    let mut action = action_for(threat_level);
    if degraded && confidence < config.min_confidence {
        // fail closed: degraded low-confidence input is never waved through
        let floor = if threat_level >= ThreatLevel::Medium {
            PolicyAction::SanitizeThenAllow
        } else {
            PolicyAction::Monitor
        };
        action = action.max(floor);
    }

    Classification {
        threat_level,
        confidence,
        action,
        explanation: explain(breakdown, merged, heuristics, degraded),
    }
}

/// Build the explanation string: dominant category, the rules that fired,
/// and any non-pattern evidence.
fn explain(
    breakdown: &ScoreBreakdown,
    merged: &CategoryMatches,
    heuristics: &HeuristicReport,
    degraded: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(dominant) = breakdown.dominant {
        let labels: Vec<&str> = merged
            .get(&dominant)
            .map(|hits| hits.iter().map(|h| h.label.as_str()).collect())
            .unwrap_or_default();
        parts.push(format!(
            "dominant category {} via {}",
            dominant,
            labels.join(", ")
        ));
        let others: Vec<String> = breakdown
            .category_scores
            .keys()
            .filter(|&&c| c != dominant)
            .map(ToString::to_string)
            .collect();
        if !others.is_empty() {
            parts.push(format!("supporting categories: {}", others.join(", ")));
        }
    }
    if heuristics.is_elevated() {
        parts.push(format!(
            "heuristic signals elevated (weighted {:.2})",
            heuristics.weighted_sum
        ));
    }
    if degraded {
        parts.push("input degraded during analysis".to_string());
    }

    if parts.is_empty() {
        "No significant prompt injection patterns detected.".to_string()
    } else {
        format!("Risk {:.1}: {}", breakdown.risk_score, parts.join("; "))
    }
}
