//! Input normalization with raw-offset tracking.
//!
//! The normalizer canonicalizes text before any rule or heuristic sees it,
//! while keeping a byte-level map back to the raw input so matches can be
//! reported (and redacted) at their original positions. It never fails:
//! hostile or malformed input degrades to best-effort printable text, and
//! the amount of degradation is itself a weak obfuscation signal.

use unicode_normalization::UnicodeNormalization;

/// Normalized text plus the offset map back to the raw input.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// The canonicalized text all analyzers operate on.
    pub text: String,
    /// `offsets[i]` = raw byte offset of the character that produced
    /// normalized byte `i`. Monotonically non-decreasing.
    offsets: Vec<usize>,
    /// Total raw length in bytes, for mapping spans that end at EOF.
    raw_len: usize,
    /// Non-printable control characters removed during normalization.
    pub stripped_controls: usize,
    /// U+FFFD replacement characters observed in the input (markers of
    /// upstream lossy decoding).
    pub replacement_chars: usize,
}

impl Normalized {
    /// Map a `[start, end)` byte span in normalized text back to raw bytes.
    ///
    /// Spans are clamped to the raw input; positions past the last mapped
    /// byte resolve to the raw end.
    #[must_use]
    pub fn map_span(&self, start: usize, end: usize) -> (usize, usize) {
        let raw_start = self.offsets.get(start).copied().unwrap_or(self.raw_len);
        let raw_end = self.offsets.get(end).copied().unwrap_or(self.raw_len);
        (raw_start, raw_end.max(raw_start))
    }

    /// True when normalization had to alter or drop input characters.
    #[must_use]
    pub fn degraded_input(&self) -> bool {
        self.stripped_controls > 0 || self.replacement_chars > 0
    }
}

/// Controls that survive normalization (layout-relevant whitespace).
fn keep_control(c: char) -> bool {
    matches!(c, '\n' | '\t' | '\r')
}

/// Canonicalize `raw`: NFKC normalization per source character, control
/// stripping, and offset-map construction.
///
/// NFKC folds full-width forms, ligatures, and compatibility variants onto
/// their plain equivalents, which defeats the common trick of spelling
/// "ignore" with lookalike code points. Case is preserved; rules match
/// case-insensitively instead, so reported segments keep original casing.
#[must_use]
pub fn normalize(raw: &str) -> Normalized {
    let mut text = String::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(raw.len());
    let mut stripped_controls = 0usize;
    let mut replacement_chars = 0usize;

    for (raw_idx, ch) in raw.char_indices() {
        if ch == '\u{FFFD}' {
            replacement_chars += 1;
        }
        for normalized in std::iter::once(ch).nfkc() {
            if normalized.is_control() && !keep_control(normalized) {
                stripped_controls += 1;
                continue;
            }
            text.push(normalized);
            for _ in 0..normalized.len_utf8() {
                offsets.push(raw_idx);
            }
        }
    }

    Normalized {
        text,
        offsets,
        raw_len: raw.len(),
        stripped_controls,
        replacement_chars,
    }
}
