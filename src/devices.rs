//! Device enumerator - external monitors reachable through a command-line tool
//!
//! Discovery runs the configured query (`ddccontrol -p` by default) and keeps
//! every line carrying the marker token, extracting the identifier that
//! follows it. Pushes run the apply command once per device with an integer
//! level; one failing device never stops the others.
//!
//! An empty device list is not an error: the controller then runs in
//! settings-only mode.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::DevicesConfig;
use crate::error::{Result, SyncError};
use crate::runner::{expand_template, CommandRunner};

/// Opaque identifier of one controllable monitor (e.g. `dev:/dev/i2c-4`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract device identifiers from discovery output.
///
/// Whitespace inside a line is ignored and the marker is matched
/// case-insensitively. Only lines yielding a non-empty token count, so a bare
/// marker line never produces an empty handle. Order is preserved and
/// duplicates are dropped.
pub fn parse_device_listing(output: &str, marker: &str) -> Vec<DeviceHandle> {
    let marker: String = marker
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if marker.is_empty() {
        return Vec::new();
    }

    let mut devices: Vec<DeviceHandle> = Vec::new();
    for line in output.lines() {
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let Some(pos) = compact.to_ascii_lowercase().find(&marker) else {
            continue;
        };

        let token = &compact[pos + marker.len()..];
        if token.is_empty() {
            trace!("Skipping marker line without device token: {:?}", line);
            continue;
        }

        let handle = DeviceHandle::new(token);
        if !devices.contains(&handle) {
            devices.push(handle);
        }
    }
    devices
}

/// Outcome of pushing one level to every device
#[derive(Debug, Default)]
pub struct PushReport {
    pub level: i64,
    pub succeeded: Vec<DeviceHandle>,
    pub failed: Vec<(DeviceHandle, SyncError)>,
}

impl PushReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Discovers monitors and pushes levels to them
///
/// Cheap to clone; the runner is shared.
#[derive(Clone)]
pub struct DeviceEnumerator {
    runner: Arc<dyn CommandRunner>,
    config: DevicesConfig,
}

impl DeviceEnumerator {
    pub fn new(runner: Arc<dyn CommandRunner>, config: DevicesConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &DevicesConfig {
        &self.config
    }

    /// Run the discovery query, surfacing spawn failures
    pub fn try_discover(&self) -> Result<Vec<DeviceHandle>> {
        if !self.config.enabled {
            debug!("Device control disabled, skipping discovery");
            return Ok(Vec::new());
        }

        let output = self
            .runner
            .run(&self.config.discover_command)
            .map_err(|e| SyncError::DeviceQuery(e.to_string()))?;

        // ddccontrol exits non-zero on partial probe failures but still lists devices
        if !output.success() {
            debug!(
                "Discovery command reported {}, parsing output anyway",
                output.failure_reason()
            );
        }

        Ok(parse_device_listing(&output.stdout, &self.config.marker))
    }

    /// Discover devices; any failure yields an empty list (settings-only mode)
    pub fn discover(&self) -> Vec<DeviceHandle> {
        let devices = match self.try_discover() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device discovery failed: {}", e);
                Vec::new()
            }
        };

        if devices.is_empty() {
            info!("No controllable devices found, running in settings-only mode");
        } else {
            info!(
                "🖥️  Discovered {} device(s): {}",
                devices.len(),
                devices
                    .iter()
                    .map(DeviceHandle::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        devices
    }

    /// Send `level` to one device
    pub fn push(&self, device: &DeviceHandle, level: i64) -> Result<()> {
        let value = level.to_string();
        let argv = expand_template(
            &self.config.push_command,
            &[("device", device.as_str()), ("value", &value)],
        );

        let output = self.runner.run(&argv).map_err(|e| SyncError::DevicePush {
            device: device.to_string(),
            reason: e.to_string(),
        })?;

        if !output.success() {
            return Err(SyncError::DevicePush {
                device: device.to_string(),
                reason: output.failure_reason(),
            });
        }

        debug!("Pushed level {} to {}", level, device);
        Ok(())
    }

    /// Send `level` to every device, continuing past failures
    pub fn push_all(&self, devices: &[DeviceHandle], level: i64) -> PushReport {
        let mut report = PushReport {
            level,
            ..PushReport::default()
        };

        for device in devices {
            match self.push(device, level) {
                Ok(()) => report.succeeded.push(device.clone()),
                Err(e) => {
                    warn!("⚠️  {}", e);
                    report.failed.push((device.clone(), e));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, DryRunRunner};

    const DDCCONTROL_PROBE: &str = "\
ddccontrol version 0.4.4
Copyright 2004-2005 Oleg I. Vdovikin (oleg@cs.msu.su)

Probing for available monitors.......
Detected monitors :
 - Device: dev:/dev/i2c-4
   DDC/CI supported: Yes
   Monitor Name: Dell U2415
 - Device: dev:/dev/i2c-6
   DDC/CI supported: Yes
";

    fn handles(ids: &[&str]) -> Vec<DeviceHandle> {
        ids.iter().map(|id| DeviceHandle::new(*id)).collect()
    }

    #[test]
    fn test_parse_compact_listing() {
        let devices = parse_device_listing("...-Device:devA\n-Device:devB\n", "Device:");
        assert_eq!(devices, handles(&["devA", "devB"]));
    }

    #[test]
    fn test_parse_ddccontrol_probe() {
        let devices = parse_device_listing(DDCCONTROL_PROBE, "Device:");
        assert_eq!(devices, handles(&["dev:/dev/i2c-4", "dev:/dev/i2c-6"]));
    }

    #[test]
    fn test_parse_skips_bare_marker_and_duplicates() {
        let output = "Device:\n- device: devA\n-Device:devA\n  DEVICE:devC\n";
        assert_eq!(parse_device_listing(output, "Device:"), handles(&["devA", "devC"]));
    }

    #[test]
    fn test_parse_nothing_recognisable() {
        assert!(parse_device_listing("", "Device:").is_empty());
        assert!(parse_device_listing("script error", "Device:").is_empty());
        assert!(parse_device_listing("-Device:devA", "").is_empty());
    }

    fn enumerator(runner: Arc<DryRunRunner>) -> DeviceEnumerator {
        let config = DevicesConfig {
            discover_command: vec!["ddccontrol".into(), "-p".into()],
            push_command: vec![
                "ddccontrol".into(),
                "{device}".into(),
                "-w".into(),
                "{value}".into(),
            ],
            ..DevicesConfig::default()
        };
        DeviceEnumerator::new(runner, config)
    }

    #[test]
    fn test_discover_uses_runner_output() {
        let runner = Arc::new(
            DryRunRunner::new()
                .with_response(&["ddccontrol", "-p"], CommandOutput::ok(DDCCONTROL_PROBE)),
        );
        let devices = enumerator(runner).discover();
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn test_discover_disabled_is_empty() {
        let runner = Arc::new(DryRunRunner::new());
        let mut enumerator = enumerator(runner.clone());
        enumerator.config.enabled = false;

        assert!(enumerator.discover().is_empty());
        assert!(runner.history().is_empty());
    }

    #[test]
    fn test_push_all_continues_after_failure() {
        let runner = Arc::new(DryRunRunner::new().with_response(
            &["ddccontrol", "devA"],
            CommandOutput::failed(1, "i2c write failed"),
        ));
        let enumerator = enumerator(runner.clone());

        let report = enumerator.push_all(&handles(&["devA", "devB"]), 40);

        assert_eq!(report.succeeded, handles(&["devB"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, DeviceHandle::new("devA"));
        assert!(!report.all_succeeded());

        let history = runner.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], vec!["ddccontrol", "devB", "-w", "40"]);
    }
}
