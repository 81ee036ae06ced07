//! SyncActor - single-task owner of the controller state
//!
//! All UI events, store notifications and the debounce deadline are handled
//! by one tokio task, so there is never more than one pending push timer and
//! no locking around the value.
//!
//! ```text
//!  SyncHandle ──┐
//!               ├──▶ command_rx ──▶ SyncCore ──▶ view (render)
//!  store notify ┘                       │
//!                                       ├──▶ settings store (write)
//!                                       └──▶ Debouncer ──deadline──▶ devices (push)
//! ```
//!
//! Blocking collaborators (external processes, the store) run on
//! `spawn_blocking` and are awaited, which keeps events strictly ordered.

use std::ops::{ControlFlow, RangeInclusive};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::commands::{SyncCommand, SyncSnapshot};
use super::core::{Outcome, Render, SyncCore, SyncPolicy, UpdateSource};
use super::handle::SyncHandle;
use crate::config::AppConfig;
use crate::debounce::Debouncer;
use crate::devices::{DeviceEnumerator, DeviceHandle};
use crate::error::{Result, SyncError};
use crate::settings::{ChangeCallback, SettingsStore, Subscription};
use crate::view::ValueView;

/// Everything the controller needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub policy: SyncPolicy,
    /// Settings key observed and written (`text-scaling-factor`)
    pub key: String,
    pub debounce: Duration,
    /// Integer range of the device apply command
    pub levels: RangeInclusive<i64>,
}

impl SyncOptions {
    /// Build from configuration, failing on degenerate bounds
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            policy: SyncPolicy::from_config(config)?,
            key: config.settings.key.clone(),
            debounce: config.sync.debounce_window(),
            levels: config.devices.levels(),
        })
    }
}

/// Actor owning the value, the debounce timer and the store subscription
pub struct SyncActor {
    core: SyncCore,
    debouncer: Debouncer<f64>,
    key: String,
    levels: RangeInclusive<i64>,
    store: Arc<dyn SettingsStore>,
    enumerator: DeviceEnumerator,
    devices: Vec<DeviceHandle>,
    view: Box<dyn ValueView>,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    /// Weak so that store callbacks never keep the actor alive
    notify_tx: mpsc::WeakUnboundedSender<SyncCommand>,
    subscription: Option<Subscription>,
    pushes: u64,
}

impl SyncActor {
    /// Spawn the actor task and return a handle to it.
    ///
    /// Start-up (initial read, store subscription, device discovery) happens
    /// inside the task; commands sent meanwhile are queued.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        options: SyncOptions,
        store: Arc<dyn SettingsStore>,
        enumerator: DeviceEnumerator,
        view: Box<dyn ValueView>,
    ) -> SyncHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let default = options.policy.range.default_value();
        let actor = SyncActor {
            core: SyncCore::new(options.policy, default),
            debouncer: Debouncer::new(options.debounce),
            key: options.key,
            levels: options.levels,
            store,
            enumerator,
            devices: Vec::new(),
            view,
            command_rx,
            notify_tx: cmd_tx.downgrade(),
            subscription: None,
            pushes: 0,
        };

        tokio::spawn(actor.run());

        SyncHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        self.start().await;

        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            return;
                        }
                    }
                    None => {
                        debug!("All sync handles dropped");
                        break;
                    }
                },
                _ = sleep_until(deadline) => self.fire_due().await,
            }
        }

        self.teardown();
    }

    async fn start(&mut self) {
        let store = self.store.clone();
        let key = self.key.clone();
        match blocking(move || store.get_double(&key)).await {
            Ok(value) => {
                self.core
                    .set_value_and_propagate(UpdateSource::External, value, None);
            }
            Err(e) => warn!(
                "Could not read '{}', starting from default {}: {}",
                self.key,
                self.core.range().default_value(),
                e
            ),
        }

        let notify_tx = self.notify_tx.clone();
        let callback: ChangeCallback = Arc::new(move |key: &str| {
            if let Some(tx) = notify_tx.upgrade() {
                let _ = tx.send(SyncCommand::ExternalChanged {
                    key: key.to_string(),
                });
            }
        });
        match self.store.subscribe(&self.key, callback) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => warn!(
                "Could not observe '{}', external changes will be missed: {}",
                self.key, e
            ),
        }

        let enumerator = self.enumerator.clone();
        self.devices = blocking(move || Ok(enumerator.discover()))
            .await
            .unwrap_or_else(|e| {
                warn!("Device discovery task failed: {}", e);
                Vec::new()
            });

        let render = self.core.render();
        self.apply_render(&render);

        info!(
            "✅ Sync controller started ('{}' = {}, {} device(s))",
            self.key,
            self.core.text(),
            self.devices.len()
        );
    }

    async fn handle_command(&mut self, cmd: SyncCommand) -> ControlFlow<()> {
        let outcome = match cmd {
            SyncCommand::SliderChanged { position } => self.core.slider_changed(position),
            SyncCommand::TextCommitted { text } => self.core.text_committed(&text),
            SyncCommand::Reset => self.core.reset(),
            SyncCommand::Scroll { direction } => self.core.scroll(direction),
            SyncCommand::ApplyToSystem => self.core.apply_to_system(),
            SyncCommand::ExternalChanged { key } => {
                if key != self.key {
                    trace!("Ignoring change notification for '{}'", key);
                    return ControlFlow::Continue(());
                }
                let store = self.store.clone();
                match blocking(move || store.get_double(&key)).await {
                    Ok(value) => self.core.external_change(value),
                    Err(e) => {
                        warn!("Could not read '{}' after change notification: {}", self.key, e);
                        return ControlFlow::Continue(());
                    }
                }
            }
            SyncCommand::Snapshot { response } => {
                let _ = response.send(self.snapshot());
                return ControlFlow::Continue(());
            }
            SyncCommand::Shutdown { response } => {
                self.teardown();
                let _ = response.send(());
                return ControlFlow::Break(());
            }
        };

        self.execute(outcome).await;
        ControlFlow::Continue(())
    }

    /// Carry out the effects decided by the core
    async fn execute(&mut self, outcome: Outcome) {
        if let Some(render) = &outcome.render {
            self.apply_render(render);
        }

        if let Some(rejection) = outcome.rejection {
            debug!("Discarded edit, kept {}: {}", self.core.text(), rejection);
            return;
        }

        if let Some(value) = outcome.write_settings {
            let store = self.store.clone();
            let key = self.key.clone();
            if let Err(e) = blocking(move || store.set_double(&key, value)).await {
                warn!("Could not write {} to '{}': {}", value, self.key, e);
            }
        }

        if let Some(value) = outcome.retarget_push {
            if self.debouncer.retarget(value) {
                debug!("Pending device push retargeted to external value {}", value);
            }
        }

        if let Some(value) = outcome.request_push {
            if self.devices.is_empty() {
                trace!("Settings-only mode, no device push for {}", value);
            } else if self.debouncer.request(value, Instant::now()) {
                trace!(
                    "Device push of {} scheduled in {:?}",
                    value,
                    self.debouncer.window()
                );
            }
        }
    }

    fn apply_render(&mut self, render: &Render) {
        if let Some(position) = render.slider {
            self.view.set_slider(position);
        }
        self.view.set_text(&render.text);
        self.view.set_label(&render.label);
        self.view.set_reset_enabled(render.reset_enabled);
    }

    async fn fire_due(&mut self) {
        let Some(value) = self.debouncer.take_due(Instant::now()) else {
            return;
        };

        let level = self.core.range().device_level(value, &self.levels);
        let enumerator = self.enumerator.clone();
        let devices = self.devices.clone();

        debug!("Pushing level {} ({}) to {} device(s)", level, value, devices.len());
        let report = match blocking(move || Ok(enumerator.push_all(&devices, level))).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Device push task failed: {}", e);
                return;
            }
        };
        self.pushes += 1;

        for (device, error) in &report.failed {
            self.view.notify_warning(
                &format!("Could not set level on {}", device),
                &error.to_string(),
            );
        }
    }

    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            value: self.core.value(),
            text: self.core.text().to_string(),
            slider_position: self.core.position(),
            label: self.core.label(),
            reset_enabled: self.core.reset_enabled(),
            write_mode: self.core.policy().write_mode,
            devices: self.devices.clone(),
            pending_apply: self.debouncer.pending().copied(),
            pushes: self.pushes,
        }
    }

    fn teardown(&mut self) {
        if let Some(value) = self.debouncer.cancel() {
            debug!("Cancelled pending device push of {}", value);
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        info!(
            "Sync controller stopped ({} device push(es) performed)",
            self.pushes
        );
    }
}

/// Sleep until the debounce deadline, or forever when nothing is scheduled
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run a blocking collaborator call off the async workers
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?
}
