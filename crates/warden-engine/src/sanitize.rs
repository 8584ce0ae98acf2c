//! Sanitization: neutralize detected content while preserving the rest.
//!
//! The sanitizer consumes a prior [`DetectionResult`]; it performs no
//! detection of its own. Flagged segments are redacted with a fixed
//! placeholder, then any remaining delimiter/system tokens are stripped.
//! The contract is a fixed point in at most two passes: re-detecting the
//! sanitized text never scores higher than the original, and sanitizing a
//! second time leaves the text unchanged once redaction has converged.

use regex::{Regex, RegexBuilder};

use crate::error::{EngineError, Result};
use crate::models::{DetectionResult, FlaggedSegment};
use crate::patterns::RULE_SIZE_LIMIT;

/// Replacement inserted for each redacted segment.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// The sanitizer. Holds the compiled token-stripping pattern.
#[derive(Debug)]
pub struct Sanitizer {
    delimiter_tokens: Regex,
}

impl Sanitizer {
    /// Compile the sanitizer.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidPattern`] if the token pattern fails to
    /// compile within the size budget.
    pub fn new() -> Result<Self> {
        let pattern = r"```|<\|[^|]{0,40}\|>|\[/?(?:SYSTEM|INST)\]";
        let delimiter_tokens = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(RULE_SIZE_LIMIT)
            .build()
            .map_err(|e| EngineError::InvalidPattern {
                category: "sanitizer".to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { delimiter_tokens })
    }

    /// Produce the sanitized variant of `raw` for `result`.
    ///
    /// Redaction first (raw-offset segments), token stripping second, so
    /// offsets are interpreted against the original text only.
    #[must_use]
    pub fn sanitize(&self, raw: &str, result: &DetectionResult) -> String {
        let redacted = redact(raw, &result.flagged_segments);
        self.delimiter_tokens.replace_all(&redacted, "").into_owned()
    }
}

/// Replace every flagged segment with the placeholder. Overlapping and
/// adjacent segments collapse into one redaction.
fn redact(raw: &str, segments: &[FlaggedSegment]) -> String {
    if segments.is_empty() {
        return raw.to_string();
    }

    let mut spans: Vec<(usize, usize)> = segments
        .iter()
        .map(|s| {
            (
                clamp_boundary(raw, s.offset),
                clamp_boundary(raw, s.end()),
            )
        })
        .filter(|(start, end)| end > start)
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&raw[cursor..start]);
        out.push_str(REDACTION_PLACEHOLDER);
        cursor = end;
    }
    out.push_str(&raw[cursor..]);
    out
}

/// Clamp a byte offset into `raw` down to the nearest char boundary.
fn clamp_boundary(raw: &str, offset: usize) -> usize {
    let mut offset = offset.min(raw.len());
    while offset > 0 && !raw.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
