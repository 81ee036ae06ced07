//! Settings store capability
//!
//! The authoritative value lives in a key-value settings store with change
//! notification (GSettings on GNOME). The controller only needs three things
//! from it: read a double, write a double, and hear about `changed::<key>`.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: in-process map, used for brightness mode and tests
//! - [`GsettingsStore`]: the `gsettings` command-line tool
//!
//! Subscriptions are RAII guards: dropping a [`Subscription`] detaches the
//! listener, so a torn-down controller never receives a late notification.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace, warn};

use crate::error::{Result, SyncError};
use crate::runner::CommandRunner;

/// Called with the changed key
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Key-value store holding the authoritative setting
pub trait SettingsStore: Send + Sync {
    fn get_double(&self, key: &str) -> Result<f64>;

    fn set_double(&self, key: &str, value: f64) -> Result<()>;

    /// Observe external modifications of `key` until the guard is dropped
    fn subscribe(&self, key: &str, callback: ChangeCallback) -> Result<Subscription>;
}

/// Detaches a change listener when dropped
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detach now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, f64>,
    listeners: HashMap<u64, (String, ChangeCallback)>,
    next_listener_id: u64,
}

/// In-process settings store
///
/// Clones share the same data, so a clone can play the "other process"
/// writing the key.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: impl Into<String>, value: f64) -> Self {
        let store = Self::new();
        store.inner.lock().values.insert(key.into(), value);
        store
    }

    /// Number of live subscriptions on `key`
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .values()
            .filter(|(k, _)| k == key)
            .count()
    }
}

impl SettingsStore for MemoryStore {
    fn get_double(&self, key: &str) -> Result<f64> {
        self.inner
            .lock()
            .values
            .get(key)
            .copied()
            .ok_or_else(|| SyncError::Settings(format!("key '{}' is not set", key)))
    }

    fn set_double(&self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(SyncError::Settings(format!(
                "refusing to store non-finite value {} for '{}'",
                value, key
            )));
        }

        // Callbacks run outside the lock so they may read the store
        let callbacks: Vec<ChangeCallback> = {
            let mut inner = self.inner.lock();
            let previous = inner.values.insert(key.to_string(), value);
            if previous == Some(value) {
                trace!("'{}' unchanged ({}), no notification", key, value);
                return Ok(());
            }
            inner
                .listeners
                .values()
                .filter(|(k, _)| k == key)
                .map(|(_, cb)| cb.clone())
                .collect()
        };

        for callback in callbacks {
            callback(key);
        }
        Ok(())
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> Result<Subscription> {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(id, (key.to_string(), callback));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock().listeners.remove(&id);
            }
        }))
    }
}

/// Settings store backed by the `gsettings` command-line tool
pub struct GsettingsStore {
    runner: Arc<dyn CommandRunner>,
    schema_id: String,
}

impl GsettingsStore {
    pub fn new(runner: Arc<dyn CommandRunner>, schema_id: impl Into<String>) -> Self {
        Self {
            runner,
            schema_id: schema_id.into(),
        }
    }

    fn argv(&self, verb: &str, key: &str, value: Option<String>) -> Vec<String> {
        let mut argv = vec![
            "gsettings".to_string(),
            verb.to_string(),
            self.schema_id.clone(),
            key.to_string(),
        ];
        argv.extend(value);
        argv
    }
}

/// Parse a `gsettings get` double (`1.25`, or `@d 1.25` for typed output)
pub fn parse_gsettings_double(output: &str) -> Option<f64> {
    let trimmed = output.trim();
    let trimmed = trimmed.strip_prefix("@d").unwrap_or(trimmed).trim();
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl SettingsStore for GsettingsStore {
    fn get_double(&self, key: &str) -> Result<f64> {
        let output = self.runner.run(&self.argv("get", key, None))?;
        if !output.success() {
            return Err(SyncError::Settings(format!(
                "gsettings get {} {}: {}",
                self.schema_id,
                key,
                output.failure_reason()
            )));
        }

        parse_gsettings_double(&output.stdout).ok_or_else(|| {
            SyncError::Settings(format!(
                "gsettings returned a non-numeric value for '{}': {:?}",
                key,
                output.stdout.trim()
            ))
        })
    }

    fn set_double(&self, key: &str, value: f64) -> Result<()> {
        // Debug formatting keeps the decimal point, so GVariant parses a double
        let output = self
            .runner
            .run(&self.argv("set", key, Some(format!("{:?}", value))))?;
        if !output.success() {
            return Err(SyncError::Settings(format!(
                "gsettings set {} {}: {}",
                self.schema_id,
                key,
                output.failure_reason()
            )));
        }
        Ok(())
    }

    /// Spawns `gsettings monitor`; each output line is one change.
    ///
    /// With a dry-run runner the monitor is only recorded and the returned
    /// subscription never fires. Otherwise must be called from within a
    /// tokio runtime.
    fn subscribe(&self, key: &str, callback: ChangeCallback) -> Result<Subscription> {
        let argv = self.argv("monitor", key, None);
        if self.runner.is_dry_run() {
            self.runner.run(&argv)?;
            return Ok(Subscription::new(|| {}));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SyncError::Settings("gsettings monitor requires a tokio runtime".to_string())
        })?;

        let mut child = tokio::process::Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                program: argv[0].clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SyncError::Settings("gsettings monitor has no stdout".to_string()))?;

        let key = key.to_string();
        let task = runtime.spawn(async move {
            // Keep the child alive for as long as the task runs
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        trace!("gsettings monitor: {}", line);
                        callback(&key);
                    }
                    Ok(None) => {
                        warn!("gsettings monitor for '{}' exited", key);
                        break;
                    }
                    Err(e) => {
                        warn!("gsettings monitor read error for '{}': {}", key, e);
                        break;
                    }
                }
            }
        });

        debug!("Started gsettings monitor for {}", self.schema_id);
        Ok(Subscription::new(move || task.abort()))
    }
}
