//! Pattern rule library and matcher.
//!
//! Rules are compiled once at engine construction and are immutable
//! afterwards; a rule set is replaced as a whole by building a new engine,
//! never mutated in place. Compilation is fail-fast: a rule that does not
//! compile, or that exceeds the per-rule complexity budget, aborts engine
//! creation rather than silently weakening detection.
//!
//! Matching uses the `regex` crate, which guarantees linear-time execution,
//! so a hostile input cannot trigger catastrophic backtracking. The
//! remaining runtime guard is [`MAX_SCAN_BYTES`], a hard cap on how much of
//! the input each rule scans.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::AttackCategory;

/// Per-rule compiled-program budget in bytes.
///
/// Bounded wildcards under case-insensitive Unicode matching expand to
/// sizable compiled programs (the widest built-in rule needs well over
/// 64 KiB), so the budget is generous. It exists to reject pathological
/// extra rules, not to pinch the built-in library.
pub const RULE_SIZE_LIMIT: usize = 1 << 21;

/// Hard cap on scanned input, aligned down to a char boundary.
pub const MAX_SCAN_BYTES: usize = 16 * 1024;

/// A compiled, immutable pattern rule.
#[derive(Debug)]
pub struct PatternRule {
    /// Category this rule contributes to.
    pub category: AttackCategory,
    /// Compiled case-insensitive regex.
    regex: Regex,
    /// Rule severity weight, `[0, 1]`.
    pub weight: f64,
    /// Label cited in results and explanations.
    pub label: String,
}

/// One rule match, with its span in NORMALIZED text.
///
/// The engine maps spans back to raw offsets before building the public
/// [`PatternHit`](crate::models::PatternHit).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Category of the matching rule.
    pub category: AttackCategory,
    /// Label of the matching rule.
    pub label: String,
    /// Rule severity weight.
    pub weight: f64,
    /// `[start, end)` byte span in normalized text.
    pub span: (usize, usize),
}

/// Matches grouped per category, in deterministic order.
pub type CategoryMatches = BTreeMap<AttackCategory, Vec<RuleMatch>>;

struct RuleSpec {
    category: AttackCategory,
    pattern: &'static str,
    weight: f64,
    label: &'static str,
}

const fn rule(
    category: AttackCategory,
    pattern: &'static str,
    weight: f64,
    label: &'static str,
) -> RuleSpec {
    RuleSpec {
        category,
        pattern,
        weight,
        label,
    }
}

/// Built-in rule library.
///
/// Covers the eight attack categories; weights encode how strongly a match
/// indicates a real attack (direct overrides and special tokens high,
/// encoding hints lower).
#[rustfmt::skip]
const BUILTIN_RULES: &[RuleSpec] = &[
    // Direct instruction override
    rule(AttackCategory::InstructionOverride,
        r"ignore\s+(?:all\s+)?(?:previous|prior|above)\s+(?:instructions?|prompts?|directions?|rules?)",
        0.95, "ignore_previous_instructions"),
    rule(AttackCategory::InstructionOverride,
        r"disregard\s+(?:all\s+)?(?:your\s+)?(?:previous|prior|above)\s+(?:instructions?|prompts?|rules?|guidelines?)",
        0.95, "disregard_instructions"),
    rule(AttackCategory::InstructionOverride,
        r"forget\s+(?:everything|all|what)\s*(?:above|previously|you\s+(?:know|said|learned))?",
        0.9, "forget_context"),
    rule(AttackCategory::InstructionOverride,
        r"new\s+instructions?\s*:", 0.85, "new_instructions"),
    rule(AttackCategory::InstructionOverride,
        r"system\s*:\s*ignore", 0.9, "system_ignore"),

    // Role manipulation
    rule(AttackCategory::RoleManipulation,
        r"you\s+are\s+now\s+(?:a|an|in)\s+\w+", 0.85, "you_are_now"),
    rule(AttackCategory::RoleManipulation,
        r"act\s+as\s+(?:a|an)\s+\w+", 0.75, "act_as"),
    rule(AttackCategory::RoleManipulation,
        r"pretend\s+(?:you\s+are|to\s+be)", 0.8, "pretend_to_be"),
    rule(AttackCategory::RoleManipulation,
        r"from\s+now\s+on,?\s+you", 0.8, "from_now_on"),
    rule(AttackCategory::RoleManipulation,
        r"your\s+new\s+role\s+is", 0.85, "new_role"),
    rule(AttackCategory::RoleManipulation,
        r"system\s*:\s*you\s+are", 0.9, "system_role_claim"),

    // System prompt leakage
    rule(AttackCategory::PromptLeakage,
        r"what\s+(?:are|were|is)\s+your\s+(?:original|initial|system)\s+(?:instructions?|prompts?|configurations?)",
        0.9, "query_original_instructions"),
    rule(AttackCategory::PromptLeakage,
        r"(?:show|tell|give|reveal|print|display|output|repeat)\s+(?:me\s+)?(?:your|the)\s+(?:original\s+|initial\s+|system\s+)?(?:prompt|instructions?|configuration)",
        0.9, "extract_system_prompt"),
    rule(AttackCategory::PromptLeakage,
        r"what\s+are\s+you\s+programmed\s+to", 0.8, "query_programming"),

    // Delimiter injection
    rule(AttackCategory::DelimiterInjection,
        r"```\s*(?:system|assistant|user)\b", 0.95, "code_fence_role"),
    rule(AttackCategory::DelimiterInjection,
        r"<\|\s*(?:system|assistant|user|end|im_start|im_end)\s*\|>",
        0.95, "special_token"),
    rule(AttackCategory::DelimiterInjection,
        r"###\s*(?:instruction|system)", 0.85, "heading_marker"),
    rule(AttackCategory::DelimiterInjection,
        r"\[SYSTEM\]", 0.9, "system_marker"),
    rule(AttackCategory::DelimiterInjection,
        r"\[INST\]", 0.9, "inst_marker"),

    // Encoding / obfuscation hints
    rule(AttackCategory::Obfuscation,
        r"(?:base64|rot13|hex|unicode)\s*:", 0.7, "encoding_prefix"),
    rule(AttackCategory::Obfuscation,
        r"(?:base64|rot13|hex)\s*(?:encode|decode|convert)", 0.7, "encoding_request"),
    rule(AttackCategory::Obfuscation,
        r"(?:\\x[0-9a-f]{2}){2,}", 0.65, "hex_escape_run"),
    rule(AttackCategory::Obfuscation,
        r"&#\d+;", 0.6, "html_entity"),

    // Jailbreaks
    rule(AttackCategory::Jailbreak,
        r"\b(?:DAN|do\s+anything\s+now)\b", 0.9, "dan_persona"),
    rule(AttackCategory::Jailbreak,
        r"\bdeveloper\s+mode\b", 0.85, "developer_mode"),
    rule(AttackCategory::Jailbreak,
        r"\bjailbreak\b", 0.9, "jailbreak_keyword"),
    rule(AttackCategory::Jailbreak,
        r"\bunrestricted\s+mode\b", 0.85, "unrestricted_mode"),
    rule(AttackCategory::Jailbreak,
        r"bypass\s+(?:all\s+)?(?:safety|filters?|restrictions?)", 0.9, "bypass_safety"),

    // Context manipulation
    rule(AttackCategory::ContextManipulation,
        r"end\s+of\s+(?:conversation|chat|session)", 0.8, "end_of_conversation"),
    rule(AttackCategory::ContextManipulation,
        r"start\s+(?:a\s+)?new\s+(?:conversation|chat|session)", 0.75, "new_session"),
    rule(AttackCategory::ContextManipulation,
        r"reset\s+(?:the\s+)?(?:conversation|context)", 0.8, "reset_context"),
    rule(AttackCategory::ContextManipulation,
        r"clear\s+(?:all\s+)?(?:previous\s+)?(?:context|memory)", 0.8, "clear_memory"),

    // Goal hijacking
    rule(AttackCategory::GoalHijacking,
        r"your\s+(?:real|actual|true)\s+goal\s+is", 0.9, "true_goal_claim"),
    rule(AttackCategory::GoalHijacking,
        r"instead\s+of\s+.{1,60}?,\s+you\s+(?:should|must|will)", 0.8, "goal_redirect"),
    rule(AttackCategory::GoalHijacking,
        r"do\s+not\s+(?:follow|obey|listen\s+to)", 0.85, "disobedience"),
    rule(AttackCategory::GoalHijacking,
        r"prioriti[sz]e\s+this\s+over", 0.8, "priority_override"),
];

fn compile_rule(
    category: AttackCategory,
    pattern: &str,
    weight: f64,
    label: &str,
) -> Result<PatternRule> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(RULE_SIZE_LIMIT)
        .build()
        .map_err(|e| EngineError::InvalidPattern {
            category: category.as_str().to_string(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    Ok(PatternRule {
        category,
        regex,
        weight,
        label: label.to_string(),
    })
}

/// The pattern matcher: an immutable set of compiled rules.
#[derive(Debug)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl PatternMatcher {
    /// Compile the built-in library plus any configured extra rules,
    /// restricted to the enabled categories.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidPattern`] if any rule fails to compile or
    /// exceeds [`RULE_SIZE_LIMIT`].
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut rules = Vec::new();
        for spec in BUILTIN_RULES {
            if config.enabled_categories.contains(&spec.category) {
                rules.push(compile_rule(
                    spec.category,
                    spec.pattern,
                    spec.weight,
                    spec.label,
                )?);
            }
        }
        for extra in &config.extra_rules {
            if !config.enabled_categories.contains(&extra.category) {
                continue;
            }
            rules.push(compile_rule(
                extra.category,
                &extra.pattern,
                extra.weight,
                &extra.label,
            )?);
        }
        Ok(Self { rules })
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rule labels grouped by category, for the pattern-listing surface.
    #[must_use]
    pub fn rules_summary(&self) -> BTreeMap<AttackCategory, Vec<String>> {
        let mut summary: BTreeMap<AttackCategory, Vec<String>> = BTreeMap::new();
        for rule in &self.rules {
            summary
                .entry(rule.category)
                .or_default()
                .push(rule.label.clone());
        }
        summary
    }

    /// Run every rule against `text` (normalized), recording each
    /// non-overlapping match with its span and rule weight.
    ///
    /// Input beyond [`MAX_SCAN_BYTES`] is not scanned.
    #[must_use]
    pub fn scan(&self, text: &str) -> CategoryMatches {
        let capped = cap_to_char_boundary(text, MAX_SCAN_BYTES);
        let mut matches: CategoryMatches = BTreeMap::new();
        for rule in &self.rules {
            // find_iter yields non-overlapping matches per rule
            for m in rule.regex.find_iter(capped) {
                matches.entry(rule.category).or_default().push(RuleMatch {
                    category: rule.category,
                    label: rule.label.clone(),
                    weight: rule.weight,
                    span: (m.start(), m.end()),
                });
            }
        }
        matches
    }
}

/// Truncate `text` to at most `max` bytes on a char boundary.
fn cap_to_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cap = max;
    while cap > 0 && !text.is_char_boundary(cap) {
        cap -= 1;
    }
    &text[..cap]
}
