//! Detection events.
//!
//! An event is an audit record of one detection call. The prompt itself is
//! never stored; only a truncated SHA-256 fingerprint is kept, enough to
//! correlate repeated attack payloads without retaining user content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use warden_engine::{AttackCategory, DetectionResult, PolicyAction, ThreatLevel};

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// One recorded detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// When the detection ran.
    pub timestamp: DateTime<Utc>,
    /// Truncated SHA-256 of the analyzed text.
    pub fingerprint: String,
    /// Classified threat level.
    pub threat_level: ThreatLevel,
    /// Risk score at detection time.
    pub risk_score: f64,
    /// Confidence at detection time.
    pub confidence: f64,
    /// Action the engine recommended.
    pub action: PolicyAction,
    /// Categories present in the result, deduplicated.
    pub categories: Vec<AttackCategory>,
    /// Optional caller-supplied session correlation id.
    pub session_id: Option<String>,
}

impl DetectionEvent {
    /// Build an event from a detection result, fingerprinting `text`.
    #[must_use]
    pub fn from_result(
        text: &str,
        result: &DetectionResult,
        session_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            fingerprint: fingerprint(text),
            threat_level: result.threat_level,
            risk_score: result.risk_score,
            confidence: result.confidence,
            action: result.action,
            categories: result.categories(),
            session_id,
        }
    }
}

/// Truncated SHA-256 hex digest of `text`.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_truncated() {
        let a = fingerprint("ignore previous instructions");
        let b = fingerprint("ignore previous instructions");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_ne!(a, fingerprint("hello"));
    }

    #[test]
    fn test_event_carries_result_fields() {
        let result = DetectionResult::safe();
        let event = DetectionEvent::from_result("hi", &result, Some("s-1".to_string()));
        assert_eq!(event.threat_level, ThreatLevel::Safe);
        assert_eq!(event.risk_score, 0.0);
        assert_eq!(event.session_id.as_deref(), Some("s-1"));
        assert!(event.categories.is_empty());
    }
}
