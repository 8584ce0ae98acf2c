//! Engine configuration.
//!
//! An [`EngineConfig`] is constructed once, validated fail-fast, and never
//! mutated afterwards. Multiple engines may hold different configs
//! (multi-tenant policies) without sharing any mutable state. Updates are
//! expressed by building a new config through [`EngineConfigBuilder`], not
//! by editing one in place.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::models::{AttackCategory, ThreatLevel};

/// Threat-level breakpoints: the upper bounds of SAFE, LOW, MEDIUM and HIGH.
///
/// Scores map to levels over half-open intervals:
/// `[0, b0) -> SAFE`, `[b0, b1) -> LOW`, `[b1, b2) -> MEDIUM`,
/// `[b2, b3) -> HIGH`, `[b3, 100] -> CRITICAL`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoints(pub [f64; 4]);

impl Breakpoints {
    /// Default table: `[0,10) [10,30) [30,50) [50,70) [70,100]`.
    #[must_use]
    pub fn standard() -> Self {
        Self([10.0, 30.0, 50.0, 70.0])
    }

    /// Aggressive table for high-sensitivity deployments.
    #[must_use]
    pub fn strict() -> Self {
        Self([5.0, 20.0, 40.0, 60.0])
    }

    /// Tolerant table for low-stakes deployments.
    #[must_use]
    pub fn permissive() -> Self {
        Self([20.0, 40.0, 60.0, 85.0])
    }

    /// Look up a preset table by policy name.
    #[must_use]
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            "permissive" => Some(Self::permissive()),
            _ => None,
        }
    }

    /// Pure classification of a score into a threat level.
    ///
    /// Monotonic in `score` for a fixed table.
    #[must_use]
    pub fn level_for(&self, score: f64) -> ThreatLevel {
        let [b0, b1, b2, b3] = self.0;
        if score >= b3 {
            ThreatLevel::Critical
        } else if score >= b2 {
            ThreatLevel::High
        } else if score >= b1 {
            ThreatLevel::Medium
        } else if score >= b0 {
            ThreatLevel::Low
        } else {
            ThreatLevel::Safe
        }
    }

    fn validate(&self) -> Result<()> {
        let [b0, b1, b2, b3] = self.0;
        let increasing = b0 > 0.0 && b0 < b1 && b1 < b2 && b2 < b3 && b3 <= 100.0;
        if increasing {
            Ok(())
        } else {
            Err(EngineError::InvalidBreakpoints(self.0))
        }
    }
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::standard()
    }
}

/// An additional pattern rule supplied through configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraRule {
    /// Category the rule contributes to. Must be in the closed set.
    pub category: AttackCategory,
    /// Regex source, compiled case-insensitively at construction.
    pub pattern: String,
    /// Rule severity weight, `[0, 1]`.
    pub weight: f64,
    /// Label cited in results.
    pub label: String,
}

/// Immutable engine configuration.
///
/// Build with [`EngineConfigBuilder`]; `Default` yields the standard policy
/// with the built-in rule library and the original category weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk weight per category, `[0, 1]`. Weight 0 removes the category's
    /// contribution entirely, including dominant-category candidacy.
    pub category_weights: BTreeMap<AttackCategory, f64>,
    /// Categories whose rules are evaluated at all.
    pub enabled_categories: BTreeSet<AttackCategory>,
    /// Threat-level breakpoint table.
    pub breakpoints: Breakpoints,
    /// Confidence floor below which a degraded result escalates fail-closed.
    pub min_confidence: f64,
    /// Expected input length distribution for the length-anomaly signal.
    pub expected_len_mean: f64,
    /// Standard deviation of the expected length distribution.
    pub expected_len_std: f64,
    /// Extra pattern rules appended to the built-in library.
    pub extra_rules: Vec<ExtraRule>,
}

impl EngineConfig {
    /// Start building a config from the defaults.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Effective weight for a category: 0 when disabled or unlisted.
    #[must_use]
    pub fn weight(&self, category: AttackCategory) -> f64 {
        if !self.enabled_categories.contains(&category) {
            return 0.0;
        }
        self.category_weights.get(&category).copied().unwrap_or(0.0)
    }

    fn validate(&self) -> Result<()> {
        for (category, weight) in &self.category_weights {
            if !(0.0..=1.0).contains(weight) {
                return Err(EngineError::InvalidWeight {
                    category: category.as_str().to_string(),
                    weight: *weight,
                });
            }
        }
        for rule in &self.extra_rules {
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(EngineError::InvalidWeight {
                    category: rule.category.as_str().to_string(),
                    weight: rule.weight,
                });
            }
        }
        if self.expected_len_std <= 0.0 {
            return Err(EngineError::InvalidLengthStd(self.expected_len_std));
        }
        self.breakpoints.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfigBuilder::new()
            .build()
            .expect("default config is valid")
    }
}

/// Original risk weights, carried over from the reference rule library.
fn default_weights() -> BTreeMap<AttackCategory, f64> {
    use AttackCategory::*;
    BTreeMap::from([
        (InstructionOverride, 0.9),
        (RoleManipulation, 0.8),
        (PromptLeakage, 0.7),
        (DelimiterInjection, 0.95),
        (Obfuscation, 0.6),
        (Jailbreak, 1.0),
        (ContextManipulation, 0.75),
        (GoalHijacking, 0.85),
    ])
}

/// Builder for [`EngineConfig`].
///
/// All setters are `#[must_use]` and consume `self`; `build` validates and
/// produces the immutable config.
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    category_weights: BTreeMap<AttackCategory, f64>,
    enabled_categories: BTreeSet<AttackCategory>,
    breakpoints: Breakpoints,
    min_confidence: f64,
    expected_len_mean: f64,
    expected_len_std: f64,
    extra_rules: Vec<ExtraRule>,
}

impl EngineConfigBuilder {
    /// Create a builder seeded with the default weights and all categories
    /// enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            category_weights: default_weights(),
            enabled_categories: AttackCategory::ALL.iter().copied().collect(),
            breakpoints: Breakpoints::standard(),
            min_confidence: 0.4,
            expected_len_mean: 120.0,
            expected_len_std: 200.0,
            extra_rules: Vec::new(),
        }
    }

    /// Override one category's risk weight.
    #[must_use]
    pub fn category_weight(mut self, category: AttackCategory, weight: f64) -> Self {
        self.category_weights.insert(category, weight);
        self
    }

    /// Remove a category from evaluation entirely.
    #[must_use]
    pub fn disable_category(mut self, category: AttackCategory) -> Self {
        self.enabled_categories.remove(&category);
        self
    }

    /// Replace the breakpoint table.
    #[must_use]
    pub fn breakpoints(mut self, breakpoints: Breakpoints) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// Set the fail-closed confidence floor.
    #[must_use]
    pub fn min_confidence(mut self, floor: f64) -> Self {
        self.min_confidence = floor;
        self
    }

    /// Set the expected input length distribution (mean, std).
    #[must_use]
    pub fn expected_length(mut self, mean: f64, std: f64) -> Self {
        self.expected_len_mean = mean;
        self.expected_len_std = std;
        self
    }

    /// Append an extra pattern rule to the built-in library.
    #[must_use]
    pub fn extra_rule(mut self, rule: ExtraRule) -> Self {
        self.extra_rules.push(rule);
        self
    }

    /// Validate and produce the immutable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for out-of-range weights, a non-increasing
    /// breakpoint table, or a non-positive length std deviation. Extra-rule
    /// regex compilation is checked later, at engine construction.
    pub fn build(self) -> Result<EngineConfig> {
        let config = EngineConfig {
            category_weights: self.category_weights,
            enabled_categories: self.enabled_categories,
            breakpoints: self.breakpoints,
            min_confidence: self.min_confidence,
            expected_len_mean: self.expected_len_mean,
            expected_len_std: self.expected_len_std,
            extra_rules: self.extra_rules,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
