//! The detection engine: one normalization pass, three independent
//! analyzers, one scoring and classification step.
//!
//! ```text
//!                +-> PatternMatcher ---+
//!   Normalizer --+-> HeuristicAnalyzer +--> ScoringEngine -> Classifier
//!                +-> StructuralAnalyzer+
//! ```
//!
//! The engine is immutable after construction and shares no mutable state
//! across calls, so one instance serves any number of threads. Analyzer
//! failures are isolated: a panicking analyzer is dropped from the blend,
//! the result is marked `degraded`, and classification falls back to the
//! remaining sources rather than aborting the call.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::classify::classify;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::heuristics::{HeuristicAnalyzer, HeuristicReport};
use crate::models::{AttackCategory, DetectionResult, FlaggedSegment, PatternHit, ThreatLevel};
use crate::normalize::{normalize, Normalized};
use crate::patterns::{CategoryMatches, PatternMatcher, RuleMatch};
use crate::sanitize::Sanitizer;
use crate::structural::{StructuralAnalyzer, StructuralReport};

/// Weight of the degradation marker emitted when normalization had to
/// strip or replace input characters.
const DEGRADATION_HIT_WEIGHT: f64 = 0.3;

/// A fully constructed, immutable detection engine.
///
/// Construction compiles every rule and fails fast on the first invalid
/// one; `detect` itself is infallible.
#[derive(Debug)]
pub struct InjectionEngine {
    config: EngineConfig,
    matcher: PatternMatcher,
    heuristics: HeuristicAnalyzer,
    structural: StructuralAnalyzer,
    sanitizer: Sanitizer,
}

impl InjectionEngine {
    /// Build an engine for `config`.
    ///
    /// # Errors
    ///
    /// Propagates rule-compilation failures; see
    /// [`EngineError`](crate::error::EngineError).
    pub fn new(config: EngineConfig) -> Result<Self> {
        let matcher = PatternMatcher::from_config(&config)?;
        let heuristics = HeuristicAnalyzer::new(config.expected_len_mean, config.expected_len_std);
        let structural = StructuralAnalyzer::new()?;
        let sanitizer = Sanitizer::new()?;
        debug!(rules = matcher.rule_count(), "engine constructed");
        Ok(Self {
            config,
            matcher,
            heuristics,
            structural,
            sanitizer,
        })
    }

    /// Build an engine with the default (standard-policy) configuration.
    ///
    /// # Errors
    ///
    /// Only if the built-in rule library fails to compile.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// The configuration this engine was built from.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compiled rule labels per category.
    #[must_use]
    pub fn rules_summary(&self) -> std::collections::BTreeMap<AttackCategory, Vec<String>> {
        self.matcher.rules_summary()
    }

    /// Analyze one input. Never fails; hostile input degrades the result
    /// instead of erroring.
    #[must_use]
    pub fn detect(&self, text: &str) -> DetectionResult {
        if text.is_empty() {
            return DetectionResult::safe();
        }

        let normalized = normalize(text);
        let mut degraded = normalized.degraded_input();

        let pattern_matches = match catch_unwind(AssertUnwindSafe(|| {
            self.matcher.scan(&normalized.text)
        })) {
            Ok(matches) => matches,
            Err(_) => {
                warn!("pattern analyzer failed, continuing without it");
                degraded = true;
                CategoryMatches::new()
            }
        };

        let heuristic_report = match catch_unwind(AssertUnwindSafe(|| {
            self.heuristics.analyze(&normalized.text)
        })) {
            Ok(report) => report,
            Err(_) => {
                warn!("heuristic analyzer failed, continuing without it");
                degraded = true;
                excluded_heuristics()
            }
        };

        let structural_report = match catch_unwind(AssertUnwindSafe(|| {
            self.structural
                .analyze(&normalized.text, &self.matcher, &self.heuristics)
        })) {
            Ok(report) => report,
            Err(_) => {
                warn!("structural analyzer failed, continuing without it");
                degraded = true;
                StructuralReport::default()
            }
        };

        let merged = merge_matches(&pattern_matches, &structural_report, &normalized);

        let breakdown = crate::scoring::score(&self.config, &merged, &heuristic_report);
        let classification = classify(
            &self.config,
            &breakdown,
            &pattern_matches,
            &merged,
            &heuristic_report,
            &structural_report,
            degraded,
        );

        let (detected_patterns, flagged_segments) = project_hits(&merged, &normalized);

        if classification.threat_level >= ThreatLevel::High {
            warn!(
                threat = %classification.threat_level,
                score = breakdown.risk_score,
                confidence = classification.confidence,
                "injection detected"
            );
        } else {
            debug!(
                threat = %classification.threat_level,
                score = breakdown.risk_score,
                "detection complete"
            );
        }

        DetectionResult {
            threat_level: classification.threat_level,
            risk_score: breakdown.risk_score,
            confidence: classification.confidence,
            action: classification.action,
            detected_patterns,
            flagged_segments,
            explanation: classification.explanation,
            degraded,
        }
    }

    /// Sanitize `text` given its detection result.
    #[must_use]
    pub fn sanitize(&self, text: &str, result: &DetectionResult) -> String {
        self.sanitizer.sanitize(text, result)
    }
}

/// Heuristic report standing in for a failed analyzer: every signal
/// excluded, contributing nothing.
fn excluded_heuristics() -> HeuristicReport {
    HeuristicReport {
        entropy: None,
        uppercase: None,
        delimiter_density: None,
        imperative_density: None,
        length_anomaly: None,
        weighted_sum: 0.0,
        excluded: 5,
    }
}

/// Combine pattern and structural findings into one category map, adding
/// the degradation marker when normalization altered the input.
fn merge_matches(
    pattern_matches: &CategoryMatches,
    structural: &StructuralReport,
    normalized: &Normalized,
) -> CategoryMatches {
    let mut merged = pattern_matches.clone();
    for hit in &structural.hits {
        merged.entry(hit.category).or_default().push(hit.clone());
    }
    if normalized.degraded_input() {
        merged
            .entry(AttackCategory::Obfuscation)
            .or_default()
            .push(RuleMatch {
                category: AttackCategory::Obfuscation,
                label: "control_characters".to_string(),
                weight: DEGRADATION_HIT_WEIGHT,
                span: (0, 0),
            });
    }
    merged
}

/// Map normalized-span hits back to raw offsets, producing the public
/// pattern list (input order) and the redaction segments.
fn project_hits(
    merged: &CategoryMatches,
    normalized: &Normalized,
) -> (Vec<PatternHit>, Vec<FlaggedSegment>) {
    let mut hits: Vec<(usize, usize, AttackCategory, &str)> = Vec::new();
    for (&category, matches) in merged {
        for m in matches {
            let (start, end) = normalized.map_span(m.span.0, m.span.1);
            hits.push((start, end, category, m.label.as_str()));
        }
    }
    hits.sort_unstable_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)));

    let detected = hits
        .iter()
        .map(|&(start, end, category, label)| PatternHit {
            category,
            label: label.to_string(),
            span: (start, end),
        })
        .collect();
    let flagged = hits
        .iter()
        .filter(|&&(start, end, _, _)| end > start)
        .map(|&(start, end, category, _)| FlaggedSegment {
            offset: start,
            length: end - start,
            category,
        })
        .collect();
    (detected, flagged)
}
