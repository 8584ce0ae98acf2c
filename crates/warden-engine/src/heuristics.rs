//! Statistical and linguistic heuristics.
//!
//! Five pattern-independent signals, each normalized to `[0, 1]` as the
//! EXCESS over a benign baseline, so ordinary prose scores exactly zero:
//!
//! | Signal | Baseline | Weight |
//! |--------|----------|--------|
//! | Shannon entropy | 4.5 bits/char (typical English ceiling) | 0.25 |
//! | Uppercase ratio | 30% of alphabetic chars | 0.15 |
//! | Delimiter density | 5% of all chars | 0.20 |
//! | Imperative keyword density | 0 (scaled to saturate at 25% of words) | 0.25 |
//! | Length anomaly | \|z\| = 2 against the configured distribution | 0.15 |
//!
//! A signal that cannot be computed for a given input (no alphabetic
//! characters, too short for entropy estimation) is excluded from the
//! weighted sum without failing the analyzer.
//!
//! The entropy threshold and minimum analysis length follow the
//! perplexity-filter calibration for GCG-style adversarial suffixes
//! (Zou et al. 2023): natural prose sits near 4.0-4.5 bits/char,
//! gradient-optimized gibberish at 5.0+.

use std::collections::HashMap;

/// Entropy above this many bits/char counts toward the signal.
pub const ENTROPY_BASELINE: f64 = 4.5;

/// Minimum char count for a meaningful entropy estimate.
pub const MIN_ANALYSIS_LENGTH: usize = 10;

/// Fixed analyzer weights; they sum to 1.0.
const W_ENTROPY: f64 = 0.25;
const W_UPPERCASE: f64 = 0.15;
const W_DELIMITER: f64 = 0.20;
const W_IMPERATIVE: f64 = 0.25;
const W_LENGTH: f64 = 0.15;

/// Imperative verbs that frequently front injection payloads.
const IMPERATIVE_KEYWORDS: &[&str] = &[
    "ignore",
    "disregard",
    "forget",
    "override",
    "bypass",
    "pretend",
    "reveal",
    "execute",
    "activate",
    "enable",
    "obey",
    "inject",
];

/// Characters counted as structural delimiters.
const DELIMITER_CHARS: &[char] = &['`', '[', ']', '<', '>', '|', '#', '{', '}'];

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Per-signal values and the blended heuristic contribution.
///
/// `None` means the signal was excluded for this input (not enough data),
/// which is distinct from a computed value of `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicReport {
    /// Excess Shannon entropy signal.
    pub entropy: Option<f64>,
    /// Excess uppercase-ratio signal.
    pub uppercase: Option<f64>,
    /// Excess delimiter-density signal.
    pub delimiter_density: Option<f64>,
    /// Imperative-keyword density signal.
    pub imperative_density: Option<f64>,
    /// Length-anomaly signal (z-score excess).
    pub length_anomaly: Option<f64>,
    /// Weighted sum over the available signals, `[0, 1]`.
    pub weighted_sum: f64,
    /// Signals excluded for this input.
    pub excluded: usize,
}

impl HeuristicReport {
    /// True when at least one signal is meaningfully elevated.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.weighted_sum > 0.05
    }
}

/// Shannon entropy of `text` in bits per character.
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }
    let total = total as f64;
    freq.values().fold(0.0, |acc, &count| {
        let p = count as f64 / total;
        acc - p * p.log2()
    })
}

/// The heuristic analyzer. Holds only the configured length distribution;
/// everything else is fixed calibration.
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    expected_len_mean: f64,
    expected_len_std: f64,
}

impl HeuristicAnalyzer {
    /// Create an analyzer with the given expected-length distribution.
    #[must_use]
    pub fn new(expected_len_mean: f64, expected_len_std: f64) -> Self {
        Self {
            expected_len_mean,
            expected_len_std,
        }
    }

    /// Compute all signals for (normalized) `text`.
    #[must_use]
    pub fn analyze(&self, text: &str) -> HeuristicReport {
        let entropy = self.entropy_signal(text);
        let uppercase = Self::uppercase_signal(text);
        let delimiter_density = Self::delimiter_signal(text);
        let imperative_density = Self::imperative_signal(text);
        let length_anomaly = self.length_signal(text);

        let pairs = [
            (entropy, W_ENTROPY),
            (uppercase, W_UPPERCASE),
            (delimiter_density, W_DELIMITER),
            (imperative_density, W_IMPERATIVE),
            (length_anomaly, W_LENGTH),
        ];
        let weighted_sum = pairs
            .iter()
            .filter_map(|(v, w)| v.map(|v| v * w))
            .sum::<f64>();
        let excluded = pairs.iter().filter(|(v, _)| v.is_none()).count();

        HeuristicReport {
            entropy,
            uppercase,
            delimiter_density,
            imperative_density,
            length_anomaly,
            weighted_sum: clamp01(weighted_sum),
            excluded,
        }
    }

    fn entropy_signal(&self, text: &str) -> Option<f64> {
        if text.chars().count() < MIN_ANALYSIS_LENGTH {
            return None;
        }
        Some(clamp01((shannon_entropy(text) - ENTROPY_BASELINE) / 2.0))
    }

    fn uppercase_signal(text: &str) -> Option<f64> {
        let alphabetic = text.chars().filter(|c| c.is_alphabetic()).count();
        if alphabetic == 0 {
            return None;
        }
        let upper = text.chars().filter(|c| c.is_uppercase()).count();
        let ratio = upper as f64 / alphabetic as f64;
        Some(clamp01((ratio - 0.3) / 0.7))
    }

    fn delimiter_signal(text: &str) -> Option<f64> {
        let total = text.chars().count();
        if total == 0 {
            return None;
        }
        let delims = text.chars().filter(|c| DELIMITER_CHARS.contains(c)).count();
        let density = delims as f64 / total as f64;
        Some(clamp01((density - 0.05) / 0.25))
    }

    fn imperative_signal(text: &str) -> Option<f64> {
        let mut words = 0usize;
        let mut imperatives = 0usize;
        for word in text.split_whitespace() {
            words += 1;
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if IMPERATIVE_KEYWORDS.contains(&word.as_str()) {
                imperatives += 1;
            }
        }
        if words == 0 {
            return None;
        }
        let density = imperatives as f64 / words as f64;
        Some(clamp01(density / 0.25))
    }

    fn length_signal(&self, text: &str) -> Option<f64> {
        let z = (text.chars().count() as f64 - self.expected_len_mean) / self.expected_len_std;
        Some(clamp01((z.abs() - 2.0) / 3.0))
    }
}
