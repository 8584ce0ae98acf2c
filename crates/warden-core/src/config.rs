//! Facade configuration.
//!
//! One [`WardenConfig`] covers all three policies; per-policy engines are
//! built from it at construction. Overrides apply uniformly across
//! policies, since a weight override expresses "how risky is this category
//! here", not "how strict is this deployment" (that is what the policy's
//! breakpoint table encodes).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use warden_engine::AttackCategory;
use warden_monitor::DEFAULT_CAPACITY;

/// The built-in policy names, in lookup order.
pub const POLICY_NAMES: [&str; 3] = ["standard", "strict", "permissive"];

/// Configuration for the [`Warden`](crate::Warden) facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Policy used when a call names none.
    pub default_policy: String,
    /// Event-window capacity of the shared monitor.
    pub monitor_capacity: usize,
    /// Category risk-weight overrides applied to every policy engine.
    pub category_weights: BTreeMap<AttackCategory, f64>,
    /// Fail-closed confidence floor applied to every policy engine.
    pub min_confidence: f64,
    /// Expected input length (mean) for the length-anomaly signal.
    pub expected_len_mean: f64,
    /// Expected input length (std deviation).
    pub expected_len_std: f64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            default_policy: "standard".to_string(),
            monitor_capacity: DEFAULT_CAPACITY,
            category_weights: BTreeMap::new(),
            min_confidence: 0.4,
            expected_len_mean: 120.0,
            expected_len_std: 200.0,
        }
    }
}
