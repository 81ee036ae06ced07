//! Error taxonomy for the sync core
//!
//! Only [`SyncError::Configuration`] is fatal, and only at construction time.
//! Every other variant is recovered close to where it happens: rejected text
//! is re-rendered, an empty discovery means settings-only mode, and a failed
//! device push is logged and reported to the view as a warning.

use thiserror::Error;

/// Errors produced by the sync core and its external collaborators
#[derive(Debug, Error)]
pub enum SyncError {
    /// Degenerate bounds or other invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Text that does not parse as a finite number (or is out of range when
    /// out-of-range text is rejected)
    #[error("invalid input: {0:?}")]
    InvalidInput(String),

    /// The discovery command ran but could not be used
    #[error("device query failed: {0}")]
    DeviceQuery(String),

    /// The apply command failed for one device
    #[error("failed to push value to device '{device}': {reason}")]
    DevicePush { device: String, reason: String },

    /// Settings store read/write failure
    #[error("settings store error: {0}")]
    Settings(String),

    /// An external program could not be started
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A blocking helper task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// The controller was torn down and no longer accepts events
    #[error("sync controller has shut down")]
    ControllerClosed,
}

impl SyncError {
    /// Whether this error must stop start-up
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Configuration(_))
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
