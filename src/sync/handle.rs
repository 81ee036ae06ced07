//! SyncHandle - public API of the sync controller
//!
//! Cheap to clone. UI events are fire-and-forget (the actor processes them in
//! order); [`SyncHandle::snapshot`] and [`SyncHandle::shutdown`] wait for the
//! actor's reply. Once the controller is gone every method returns
//! [`SyncError::ControllerClosed`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::actor::{SyncActor, SyncOptions};
use super::commands::{SyncCommand, SyncSnapshot};
use super::core::ScrollDirection;
use crate::devices::DeviceEnumerator;
use crate::error::{Result, SyncError};
use crate::settings::SettingsStore;
use crate::view::ValueView;

/// Handle for sending events to the sync actor
#[derive(Clone, Debug)]
pub struct SyncHandle {
    cmd_tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub(super) fn new(cmd_tx: mpsc::UnboundedSender<SyncCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a controller; convenience wrapper around [`SyncActor::spawn`]
    pub fn spawn(
        options: SyncOptions,
        store: Arc<dyn SettingsStore>,
        enumerator: DeviceEnumerator,
        view: impl ValueView,
    ) -> Self {
        SyncActor::spawn(options, store, enumerator, Box::new(view))
    }

    // =========================================================================
    // UI events (fire-and-forget)
    // =========================================================================

    /// The slider moved; `position` is in `[0, 1]`
    pub fn slider_changed(&self, position: f64) -> Result<()> {
        self.send(SyncCommand::SliderChanged { position })
    }

    /// The text entry was confirmed (Enter) or lost focus
    pub fn text_committed(&self, text: impl Into<String>) -> Result<()> {
        self.send(SyncCommand::TextCommitted { text: text.into() })
    }

    pub fn reset(&self) -> Result<()> {
        self.send(SyncCommand::Reset)
    }

    pub fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        self.send(SyncCommand::Scroll { direction })
    }

    /// Write the current value to the settings store now
    pub fn apply_to_system(&self) -> Result<()> {
        self.send(SyncCommand::ApplyToSystem)
    }

    /// Deliver a `changed::<key>` notification by hand, for toolkits that
    /// observe the store themselves
    pub fn external_changed(&self, key: impl Into<String>) -> Result<()> {
        self.send(SyncCommand::ExternalChanged { key: key.into() })
    }

    // =========================================================================
    // Request-response
    // =========================================================================

    /// Current state, after every previously sent event has been handled
    pub async fn snapshot(&self) -> Result<SyncSnapshot> {
        let (response, rx) = oneshot::channel();
        self.send(SyncCommand::Snapshot { response })?;
        rx.await.map_err(|_| SyncError::ControllerClosed)
    }

    /// Tear the controller down: the pending push is cancelled and the store
    /// subscription detached before this returns
    pub async fn shutdown(&self) -> Result<()> {
        let (response, rx) = oneshot::channel();
        self.send(SyncCommand::Shutdown { response })?;
        rx.await.map_err(|_| SyncError::ControllerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    fn send(&self, cmd: SyncCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| SyncError::ControllerClosed)
    }
}
