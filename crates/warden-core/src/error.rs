//! Top-level error type.

use thiserror::Error;

/// Convenience alias for facade operations.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Errors surfaced by the [`Warden`](crate::Warden) facade.
///
/// All variants are construction- or lookup-time failures; detection
/// itself never errors for well-formed input.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Requested policy name has no breakpoint table.
    #[error("unknown policy '{0}' (expected standard, strict, or permissive)")]
    UnknownPolicy(String),

    /// Engine construction failed.
    #[error(transparent)]
    Engine(#[from] warden_engine::EngineError),

    /// Monitor construction failed.
    #[error(transparent)]
    Monitor(#[from] warden_monitor::MonitorError),
}
