//! # warden-monitor
//!
//! Audit trail for the detection engine: a bounded, concurrency-safe event
//! store plus aggregate statistics over the retained window.
//!
//! Prompts are never stored; events carry a truncated SHA-256 fingerprint
//! instead, so repeated payloads can be correlated without keeping user
//! content around. Recording is caller-triggered: the engine returns a
//! [`warden_engine::DetectionResult`], and the caller decides whether it
//! becomes a [`DetectionEvent`].

pub mod error;
pub mod event;
pub mod monitor;

pub use error::{MonitorError, Result};
pub use event::{fingerprint, DetectionEvent};
pub use monitor::{AggregateStats, DetectionMonitor, DEFAULT_CAPACITY};
