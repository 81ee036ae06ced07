//! Command enum for the sync actor
//!
//! UI events and store notifications are fire-and-forget; queries and
//! shutdown carry a oneshot channel for the reply.

use serde::Serialize;
use tokio::sync::oneshot;

use super::core::ScrollDirection;
use crate::config::WriteMode;
use crate::devices::DeviceHandle;

/// Commands processed sequentially by the sync actor
#[derive(Debug)]
pub enum SyncCommand {
    /// User moved the slider to a position in `[0, 1]`
    SliderChanged { position: f64 },

    /// User confirmed the text entry (Enter or focus loss)
    TextCommitted { text: String },

    /// User picked "reset to default"
    Reset,

    /// Scroll wheel over the panel button
    Scroll { direction: ScrollDirection },

    /// Write the current value to the settings store
    ApplyToSystem,

    /// Settings store reported `changed::<key>`
    ExternalChanged { key: String },

    /// Report the current state
    Snapshot {
        response: oneshot::Sender<SyncSnapshot>,
    },

    /// Cancel the pending push, detach from the store and stop
    Shutdown { response: oneshot::Sender<()> },
}

/// Point-in-time view of the controller state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub value: f64,
    pub text: String,
    pub slider_position: f64,
    pub label: String,
    pub reset_enabled: bool,
    pub write_mode: WriteMode,
    pub devices: Vec<DeviceHandle>,
    /// Value waiting for the debounce window to elapse
    pub pending_apply: Option<f64>,
    /// Completed device pushes since start
    pub pushes: u64,
}

impl SyncSnapshot {
    /// No hardware found, only the settings store is driven
    pub fn settings_only(&self) -> bool {
        self.devices.is_empty()
    }
}
