//! # Core Types for the Detection Engine
//!
//! This module defines the fundamental value objects used throughout the
//! engine: the attack taxonomy, threat levels, detection results, and the
//! decision actions derived from them.
//!
//! ## Attack Taxonomy
//!
//! The category set is closed. Each [`AttackCategory`] variant maps to a
//! distinct injection technique with its own rule set and risk weight:
//!
//! | Category | Technique |
//! |----------|-----------|
//! | `InstructionOverride` | "ignore previous instructions" style overrides |
//! | `RoleManipulation` | persona/role switching ("you are now a ...") |
//! | `PromptLeakage` | system prompt extraction attempts |
//! | `DelimiterInjection` | role keywords smuggled via fences / special tokens |
//! | `Obfuscation` | base64/hex/unicode-escape payload smuggling |
//! | `Jailbreak` | DAN-style mode switching, filter bypass |
//! | `ContextManipulation` | fake conversation resets / context clearing |
//! | `GoalHijacking` | redirecting the model's objective |
//!
//! ## Design Principles
//!
//! 1. **Immutable results** - a [`DetectionResult`] never changes after it
//!    is returned; callers own it.
//! 2. **Bounded scores** - `risk_score` is always within `[0, 100]` and
//!    `confidence` within `[0, 1]`.
//! 3. **Serializable** - all types derive Serde traits for audit logging
//!    and the surrounding API layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of prompt injection attacks the engine can detect.
///
/// The set is closed: new categories require a code change, never silent
/// runtime extension. Configuration referring to an unknown category name
/// fails at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    /// Direct instruction override ("ignore all previous instructions").
    InstructionOverride,
    /// Role or persona manipulation ("you are now a pirate").
    RoleManipulation,
    /// System prompt extraction ("show me your system prompt").
    PromptLeakage,
    /// Delimiter abuse: role keywords inside fences or pseudo-tags.
    DelimiterInjection,
    /// Encoded or obfuscated payloads (base64, hex, unicode escapes).
    Obfuscation,
    /// Jailbreaks: DAN, developer mode, safety filter bypass.
    Jailbreak,
    /// Fake conversation boundaries / context resets.
    ContextManipulation,
    /// Redirecting the model toward an attacker-chosen goal.
    GoalHijacking,
}

impl AttackCategory {
    /// All categories, in declaration order.
    pub const ALL: [AttackCategory; 8] = [
        AttackCategory::InstructionOverride,
        AttackCategory::RoleManipulation,
        AttackCategory::PromptLeakage,
        AttackCategory::DelimiterInjection,
        AttackCategory::Obfuscation,
        AttackCategory::Jailbreak,
        AttackCategory::ContextManipulation,
        AttackCategory::GoalHijacking,
    ];

    /// Snake-case name used in configuration, explanations, and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackCategory::InstructionOverride => "instruction_override",
            AttackCategory::RoleManipulation => "role_manipulation",
            AttackCategory::PromptLeakage => "prompt_leakage",
            AttackCategory::DelimiterInjection => "delimiter_injection",
            AttackCategory::Obfuscation => "obfuscation",
            AttackCategory::Jailbreak => "jailbreak",
            AttackCategory::ContextManipulation => "context_manipulation",
            AttackCategory::GoalHijacking => "goal_hijacking",
        }
    }

    /// Tie-break priority for the dominant-category explanation.
    ///
    /// Lower rank wins. The order reflects how alarming a category is to a
    /// human reviewer; it never influences the numeric score.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            AttackCategory::Jailbreak => 0,
            AttackCategory::DelimiterInjection => 1,
            AttackCategory::InstructionOverride => 2,
            AttackCategory::GoalHijacking => 3,
            AttackCategory::RoleManipulation => 4,
            AttackCategory::ContextManipulation => 5,
            AttackCategory::PromptLeakage => 6,
            AttackCategory::Obfuscation => 7,
        }
    }
}

impl fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttackCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown attack category: '{s}'"))
    }
}

/// Ordinal threat severity derived from the risk score.
///
/// Levels are totally ordered: `Safe < Low < Medium < High < Critical`.
/// The mapping from score to level is a pure function of the breakpoint
/// table carried by the engine configuration (see
/// [`Breakpoints`](crate::config::Breakpoints)).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    /// No significant injection signals.
    Safe,
    /// Weak or isolated signals; monitor.
    Low,
    /// Clear signals; validate or sanitize before use.
    Medium,
    /// Strong signals; reject or sanitize.
    High,
    /// Multiple strong signals; reject.
    Critical,
}

impl ThreatLevel {
    /// Explicit numeric rank (0 = Safe .. 4 = Critical).
    ///
    /// Kept explicit rather than relying on enum discriminants so ordinal
    /// comparisons survive reordering of the declaration.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            ThreatLevel::Safe => 0,
            ThreatLevel::Low => 1,
            ThreatLevel::Medium => 2,
            ThreatLevel::High => 3,
            ThreatLevel::Critical => 4,
        }
    }

    /// Display name matching the wire format ("SAFE", "LOW", ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Safe => "SAFE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the caller should take for a given threat level.
///
/// Ordered by restrictiveness so fail-closed escalation can take the
/// maximum of two actions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyAction {
    /// Forward the prompt unchanged.
    Allow,
    /// Forward, but record the event for review.
    Monitor,
    /// Sanitize the prompt, then forward the cleaned text.
    SanitizeThenAllow,
    /// Refuse the prompt.
    Reject,
}

/// A single rule match against the (normalized) input.
///
/// `span` is a `[start, end)` byte range into the ORIGINAL raw text,
/// mapped back through the normalizer's offset map, so callers can
/// highlight or redact the exact region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternHit {
    /// Category of the rule that matched.
    pub category: AttackCategory,
    /// Human-readable rule label (e.g. "ignore_previous_instructions").
    pub label: String,
    /// Byte range `[start, end)` in the raw input.
    pub span: (usize, usize),
}

/// A region of the raw input flagged for redaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedSegment {
    /// Byte offset into the raw input.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// Category that flagged this segment.
    pub category: AttackCategory,
}

impl FlaggedSegment {
    /// Exclusive end offset.
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Immutable result of one detection call.
///
/// # Invariants
///
/// - `risk_score` is within `[0, 100]`
/// - `confidence` is within `[0, 1]`
/// - `threat_level` is the pure image of `risk_score` under the policy's
///   breakpoint table
/// - `degraded` is true iff at least one analyzer failed and was excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Ordinal severity classification.
    pub threat_level: ThreatLevel,
    /// Bounded aggregate risk score, 0.0 to 100.0.
    pub risk_score: f64,
    /// Signal-source agreement, 0.0 to 1.0. Independent of `risk_score`.
    pub confidence: f64,
    /// Recommended action under the policy that produced this result.
    pub action: PolicyAction,
    /// Every non-overlapping rule match, in input order.
    pub detected_patterns: Vec<PatternHit>,
    /// Regions of the raw input to redact during sanitization.
    pub flagged_segments: Vec<FlaggedSegment>,
    /// Human-readable summary citing the dominant category.
    pub explanation: String,
    /// True if any analyzer failed and its contribution was dropped.
    pub degraded: bool,
}

impl DetectionResult {
    /// A SAFE result with zero score, used for empty input.
    #[must_use]
    pub fn safe() -> Self {
        Self {
            threat_level: ThreatLevel::Safe,
            risk_score: 0.0,
            confidence: 1.0,
            action: PolicyAction::Allow,
            detected_patterns: Vec::new(),
            flagged_segments: Vec::new(),
            explanation: "No significant prompt injection patterns detected.".to_string(),
            degraded: false,
        }
    }

    /// True if the input was classified [`ThreatLevel::Safe`].
    #[inline]
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.threat_level == ThreatLevel::Safe
    }

    /// Categories present among the detected patterns, deduplicated and
    /// sorted for deterministic output.
    #[must_use]
    pub fn categories(&self) -> Vec<AttackCategory> {
        let mut cats: Vec<AttackCategory> =
            self.detected_patterns.iter().map(|h| h.category).collect();
        cats.sort_unstable();
        cats.dedup();
        cats
    }

    /// True if any detected pattern belongs to `category`.
    #[must_use]
    pub fn has_category(&self, category: AttackCategory) -> bool {
        self.detected_patterns.iter().any(|h| h.category == category)
    }
}
