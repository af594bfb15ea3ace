use std::io;

use thiserror::Error;

/// Failures raised by a [`crate::TelemetryManager`] implementation.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The telemetry target could not be opened or written to.
    #[error("telemetry I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A record was submitted after the manager's writer thread had already
    /// been stopped.
    #[error("telemetry manager has already been stopped")]
    Stopped,
}
