//! Risk scoring.
//!
//! Scores are bounded and saturating rather than additive. A category's
//! score is driven by its configured risk weight, the severity of its worst
//! matching rule, and a diminishing-returns curve over its hit count:
//!
//! ```text
//! sat(h)   = 2 - 2 / (1 + h)          sat(0)=0, sat(1)=1, sat(inf)->2
//! score(c) = min(100, 100 * weight(c) * severity(c) * sat(hits(c)))
//! ```
//!
//! The total is dominated by the strongest category; the others contribute
//! a dampened residual, and the heuristic blend adds a pattern-free floor:
//!
//! ```text
//! risk = clamp(dominant + 0.3 * residual + 20 * heuristic_sum, 0, 100)
//! ```
//!
//! Ten weak hits therefore cannot outrank one unambiguous jailbreak, and a
//! single stuffed category can never push the score past 100 on its own.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::heuristics::HeuristicReport;
use crate::models::AttackCategory;
use crate::patterns::CategoryMatches;

/// Residual damping for non-dominant categories.
const RESIDUAL_FACTOR: f64 = 0.3;

/// Weight of the heuristic blend in the total score (fraction of 100).
const HEURISTIC_FACTOR: f64 = 0.2;

/// Per-category and total scores for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Score per category with at least one hit, `[0, 100]` each.
    pub category_scores: BTreeMap<AttackCategory, f64>,
    /// Highest-scoring category; ties resolve to the higher-priority one.
    pub dominant: Option<AttackCategory>,
    /// Heuristic contribution already included in `risk_score`.
    pub heuristic_contribution: f64,
    /// Total risk score, `[0, 100]`.
    pub risk_score: f64,
}

/// Diminishing-returns saturation over hit count.
fn sat(hits: usize) -> f64 {
    2.0 - 2.0 / (1.0 + hits as f64)
}

/// Compute the score breakdown for one set of matches.
///
/// Deterministic: iteration is over ordered maps, and the dominant-category
/// tie-break is the fixed category priority order, so equal inputs always
/// produce bit-identical output.
#[must_use]
pub fn score(
    config: &EngineConfig,
    matches: &CategoryMatches,
    heuristics: &HeuristicReport,
) -> ScoreBreakdown {
    let mut category_scores = BTreeMap::new();

    for (&category, hits) in matches {
        if hits.is_empty() {
            continue;
        }
        let weight = config.weight(category);
        if weight == 0.0 {
            continue;
        }
        let severity = hits.iter().map(|h| h.weight).fold(0.0_f64, f64::max);
        let raw = 100.0 * weight * severity * sat(hits.len());
        category_scores.insert(category, raw.min(100.0));
    }

    let dominant = category_scores
        .iter()
        .max_by(|(ca, sa), (cb, sb)| {
            sa.partial_cmp(sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                // prefer the higher-priority (lower-numbered) category on ties
                .then_with(|| cb.priority().cmp(&ca.priority()))
        })
        .map(|(&c, _)| c);

    let dominant_score = dominant
        .and_then(|c| category_scores.get(&c).copied())
        .unwrap_or(0.0);
    let residual: f64 = category_scores
        .iter()
        .filter(|(&c, _)| Some(c) != dominant)
        .map(|(_, &s)| s)
        .sum();
    let heuristic_contribution = HEURISTIC_FACTOR * 100.0 * heuristics.weighted_sum;

    let risk_score =
        (dominant_score + RESIDUAL_FACTOR * residual + heuristic_contribution).clamp(0.0, 100.0);

    ScoreBreakdown {
        category_scores,
        dominant,
        heuristic_contribution,
        risk_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::HeuristicAnalyzer;
    use crate::patterns::RuleMatch;

    fn hit(category: AttackCategory, weight: f64) -> RuleMatch {
        RuleMatch {
            category,
            label: "test_rule".to_string(),
            weight,
            span: (0, 5),
        }
    }

    fn quiet_heuristics() -> HeuristicReport {
        HeuristicAnalyzer::new(120.0, 200.0).analyze("hello there everyone")
    }

    #[test]
    fn test_no_hits_no_heuristics_is_zero() {
        let config = EngineConfig::default();
        let breakdown = score(&config, &CategoryMatches::new(), &quiet_heuristics());
        assert_eq!(breakdown.risk_score, 0.0);
        assert!(breakdown.dominant.is_none());
        assert!(breakdown.category_scores.is_empty());
    }

    #[test]
    fn test_saturation_curve() {
        assert_eq!(sat(0), 0.0);
        assert_eq!(sat(1), 1.0);
        assert!(sat(2) > 1.0 && sat(2) < 2.0);
        assert!(sat(100) < 2.0);
        assert!(sat(3) - sat(2) < sat(2) - sat(1));
    }

    #[test]
    fn test_single_category_score_bounded() {
        let config = EngineConfig::default();
        let mut matches = CategoryMatches::new();
        // 50 jailbreak hits at full severity still cap at 100
        matches.insert(
            AttackCategory::Jailbreak,
            (0..50).map(|_| hit(AttackCategory::Jailbreak, 1.0)).collect(),
        );
        let breakdown = score(&config, &matches, &quiet_heuristics());
        assert_eq!(breakdown.category_scores[&AttackCategory::Jailbreak], 100.0);
        assert_eq!(breakdown.risk_score, 100.0);
    }

    #[test]
    fn test_severity_is_max_not_sum() {
        let config = EngineConfig::default();
        let mut matches = CategoryMatches::new();
        matches.insert(
            AttackCategory::InstructionOverride,
            vec![
                hit(AttackCategory::InstructionOverride, 0.5),
                hit(AttackCategory::InstructionOverride, 0.7),
            ],
        );
        let breakdown = score(&config, &matches, &quiet_heuristics());
        // weight 0.9 * severity max(0.5, 0.7) * sat(2)=4/3; summing the
        // rule weights instead would give a different (higher) value
        let expected = 100.0 * 0.9 * 0.7 * (2.0 - 2.0 / 3.0);
        let got = breakdown.category_scores[&AttackCategory::InstructionOverride];
        assert!((got - expected).abs() < 1e-9, "{got} vs {expected}");
    }

    #[test]
    fn test_dominant_plus_dampened_residual() {
        let config = EngineConfig::default();
        let mut matches = CategoryMatches::new();
        matches.insert(
            AttackCategory::Jailbreak,
            vec![hit(AttackCategory::Jailbreak, 0.6)],
        );
        matches.insert(
            AttackCategory::PromptLeakage,
            vec![hit(AttackCategory::PromptLeakage, 0.5)],
        );
        let breakdown = score(&config, &matches, &quiet_heuristics());
        assert_eq!(breakdown.dominant, Some(AttackCategory::Jailbreak));
        let jail = 100.0 * 1.0 * 0.6; // weight 1.0
        let leak = 100.0 * 0.7 * 0.5; // weight 0.7
        // severities chosen so the total stays under the clamp
        let expected = jail + RESIDUAL_FACTOR * leak;
        assert!((breakdown.risk_score - expected).abs() < 1e-9);
        assert!(breakdown.risk_score < 100.0);
    }

    #[test]
    fn test_tie_breaks_by_category_priority() {
        // Two categories engineered to the same score: equal weights, equal
        // severity, equal hit counts.
        let config = EngineConfig::builder()
            .category_weight(AttackCategory::Obfuscation, 0.8)
            .category_weight(AttackCategory::RoleManipulation, 0.8)
            .build()
            .unwrap();
        let mut matches = CategoryMatches::new();
        matches.insert(
            AttackCategory::Obfuscation,
            vec![hit(AttackCategory::Obfuscation, 0.5)],
        );
        matches.insert(
            AttackCategory::RoleManipulation,
            vec![hit(AttackCategory::RoleManipulation, 0.5)],
        );
        let breakdown = score(&config, &matches, &quiet_heuristics());
        // role_manipulation outranks obfuscation in the priority order
        assert_eq!(breakdown.dominant, Some(AttackCategory::RoleManipulation));
    }

    #[test]
    fn test_zero_weight_category_excluded() {
        let config = EngineConfig::builder()
            .category_weight(AttackCategory::Obfuscation, 0.0)
            .build()
            .unwrap();
        let mut matches = CategoryMatches::new();
        matches.insert(
            AttackCategory::Obfuscation,
            vec![hit(AttackCategory::Obfuscation, 1.0)],
        );
        let breakdown = score(&config, &matches, &quiet_heuristics());
        assert!(breakdown.category_scores.is_empty());
        assert!(breakdown.dominant.is_none());
        assert_eq!(breakdown.risk_score, 0.0);
    }

    #[test]
    fn test_heuristics_alone_give_nonzero_floor() {
        let config = EngineConfig::default();
        let report = HeuristicAnalyzer::new(120.0, 200.0)
            .analyze("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/");
        let breakdown = score(&config, &CategoryMatches::new(), &report);
        assert!(breakdown.risk_score > 0.0);
        assert!(breakdown.dominant.is_none());
        assert_eq!(breakdown.risk_score, breakdown.heuristic_contribution);
    }

    #[test]
    fn test_determinism() {
        let config = EngineConfig::default();
        let mut matches = CategoryMatches::new();
        matches.insert(
            AttackCategory::Jailbreak,
            vec![hit(AttackCategory::Jailbreak, 0.9)],
        );
        let h = quiet_heuristics();
        let a = score(&config, &matches, &h);
        let b = score(&config, &matches, &h);
        assert_eq!(a, b);
        assert_eq!(a.risk_score.to_bits(), b.risk_score.to_bits());
    }
}
