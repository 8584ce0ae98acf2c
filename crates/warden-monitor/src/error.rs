//! Monitor error types.

use thiserror::Error;

/// Convenience alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors from monitor construction.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The event window must hold at least one event.
    #[error("monitor capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
}
