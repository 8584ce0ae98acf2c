//! The `Warden` facade: per-policy engines plus a shared monitor.
//!
//! One engine is prebuilt per policy name at construction, so a detection
//! call is a map lookup plus an immutable engine run; no locking on the
//! hot path. The monitor is shared across policies behind an `Arc` and
//! records only when the caller asks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use warden_engine::{Breakpoints, DetectionResult, EngineConfig, InjectionEngine};
use warden_monitor::{AggregateStats, DetectionEvent, DetectionMonitor};

use crate::config::{WardenConfig, POLICY_NAMES};
use crate::error::{Result, WardenError};

/// A detection result together with its wall-clock cost, matching the
/// shape the surrounding API layer reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedDetection {
    /// The detection result.
    pub result: DetectionResult,
    /// Wall-clock duration of the detection call, in milliseconds.
    pub processing_time_ms: f64,
}

/// Policy-aware detection facade. `Send + Sync`; share one instance
/// across threads.
#[derive(Debug)]
pub struct Warden {
    engines: BTreeMap<String, InjectionEngine>,
    default_policy: String,
    monitor: Arc<DetectionMonitor>,
}

impl Warden {
    /// Build engines for every policy and the shared monitor.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] if `config.default_policy` names no
    /// breakpoint table; construction errors from the engine or monitor
    /// pass through.
    pub fn new(config: WardenConfig) -> Result<Self> {
        if Breakpoints::named(&config.default_policy).is_none() {
            return Err(WardenError::UnknownPolicy(config.default_policy));
        }

        let mut engines = BTreeMap::new();
        for name in POLICY_NAMES {
            let breakpoints = Breakpoints::named(name)
                .ok_or_else(|| WardenError::UnknownPolicy(name.to_string()))?;
            let mut builder = EngineConfig::builder()
                .breakpoints(breakpoints)
                .min_confidence(config.min_confidence)
                .expected_length(config.expected_len_mean, config.expected_len_std);
            for (&category, &weight) in &config.category_weights {
                builder = builder.category_weight(category, weight);
            }
            engines.insert(name.to_string(), InjectionEngine::new(builder.build()?)?);
        }

        let monitor = Arc::new(DetectionMonitor::new(config.monitor_capacity)?);
        info!(
            policies = engines.len(),
            default = %config.default_policy,
            "warden ready"
        );
        Ok(Self {
            engines,
            default_policy: config.default_policy,
            monitor,
        })
    }

    /// Build a facade with the default configuration.
    ///
    /// # Errors
    ///
    /// Only if the built-in rule library fails to compile.
    pub fn with_defaults() -> Result<Self> {
        Self::new(WardenConfig::default())
    }

    fn engine(&self, policy: Option<&str>) -> Result<&InjectionEngine> {
        let name = policy.unwrap_or(&self.default_policy);
        self.engines
            .get(name)
            .ok_or_else(|| WardenError::UnknownPolicy(name.to_string()))
    }

    /// The shared monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<DetectionMonitor> {
        &self.monitor
    }

    /// Analyze one prompt under `policy` (default policy when `None`).
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] for an unrecognized policy name.
    pub fn detect(&self, text: &str, policy: Option<&str>) -> Result<DetectionResult> {
        Ok(self.engine(policy)?.detect(text))
    }

    /// Analyze a batch, preserving input order. Items are independent;
    /// no result is affected by any other element of the batch.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] for an unrecognized policy name.
    pub fn detect_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        policy: Option<&str>,
    ) -> Result<Vec<DetectionResult>> {
        let engine = self.engine(policy)?;
        Ok(texts.iter().map(|t| engine.detect(t.as_ref())).collect())
    }

    /// Analyze one prompt and report the wall-clock cost alongside.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] for an unrecognized policy name.
    pub fn detect_timed(&self, text: &str, policy: Option<&str>) -> Result<TimedDetection> {
        let engine = self.engine(policy)?;
        let start = Instant::now();
        let result = engine.detect(text);
        Ok(TimedDetection {
            result,
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Analyze one prompt and record the event in the shared monitor.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] for an unrecognized policy name.
    pub fn detect_and_record(
        &self,
        text: &str,
        policy: Option<&str>,
        session_id: Option<String>,
    ) -> Result<DetectionResult> {
        let result = self.detect(text, policy)?;
        self.monitor
            .record(DetectionEvent::from_result(text, &result, session_id));
        Ok(result)
    }

    /// Sanitize `text` given its detection result.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownPolicy`] for an unrecognized policy name.
    pub fn sanitize(
        &self,
        text: &str,
        result: &DetectionResult,
        policy: Option<&str>,
    ) -> Result<String> {
        Ok(self.engine(policy)?.sanitize(text, result))
    }

    /// Record a prebuilt event.
    pub fn record(&self, event: DetectionEvent) {
        self.monitor.record(event);
    }

    /// Aggregate statistics over the monitor's retained window.
    #[must_use]
    pub fn stats(&self) -> AggregateStats {
        self.monitor.stats()
    }

    /// Compiled rule labels per category, from the default policy engine.
    #[must_use]
    pub fn rules_summary(
        &self,
    ) -> BTreeMap<warden_engine::AttackCategory, Vec<String>> {
        self.engines
            .get(&self.default_policy)
            .map(InjectionEngine::rules_summary)
            .unwrap_or_default()
    }
}
