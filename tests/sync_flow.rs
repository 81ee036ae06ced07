//! End-to-end controller flows through the public API

use std::sync::Arc;
use std::time::Duration;

use text_scaler::config::{AppConfig, WriteMode};
use text_scaler::devices::DeviceEnumerator;
use text_scaler::runner::{CommandOutput, DryRunRunner};
use text_scaler::settings::{MemoryStore, SettingsStore};
use text_scaler::sync::{ScrollDirection, SyncHandle, SyncOptions};
use text_scaler::view::RecordingView;

const KEY: &str = "text-scaling-factor";

fn probe_runner() -> Arc<DryRunRunner> {
    Arc::new(DryRunRunner::new().with_response(
        &["sudo", "ddccontrol", "-p"],
        CommandOutput::ok("Detected monitors :\n - Device: dev:/dev/i2c-4\n"),
    ))
}

fn applied_levels(runner: &DryRunRunner) -> Vec<String> {
    runner
        .history()
        .into_iter()
        .filter(|argv| argv.iter().any(|a| a == "-w"))
        .filter_map(|argv| argv.last().cloned())
        .collect()
}

async fn spawn(config: &AppConfig, runner: Arc<DryRunRunner>, store: MemoryStore) -> (SyncHandle, RecordingView) {
    let view = RecordingView::new();
    let enumerator = DeviceEnumerator::new(runner, config.devices.clone());
    let handle = SyncHandle::spawn(
        SyncOptions::from_config(config).unwrap(),
        Arc::new(store),
        enumerator,
        view.clone(),
    );
    handle.snapshot().await.unwrap();
    (handle, view)
}

#[tokio::test(start_paused = true)]
async fn text_scaling_session() {
    let config = AppConfig::default();
    let runner = probe_runner();
    let store = MemoryStore::with_value(KEY, 1.0);
    let (handle, view) = spawn(&config, runner.clone(), store.clone()).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "1.00");
    assert!(!snapshot.reset_enabled);
    assert_eq!(snapshot.devices.len(), 1);

    // Another program changes the setting: view follows, nothing is pushed
    store.set_double(KEY, 1.5).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "1.50");
    assert_eq!(snapshot.slider_position, 0.4);
    assert!(snapshot.reset_enabled);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(applied_levels(&runner).is_empty());

    // Typed value is written at once and pushed after the window
    handle.text_committed("2").unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "2.00");
    assert_eq!(store.get_double(KEY).unwrap(), 2.0);
    assert_eq!(snapshot.pending_apply, Some(2.0));
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(applied_levels(&runner), vec!["60".to_string()]);

    // Out-of-range text is clamped, garbage is discarded
    handle.text_committed("9").unwrap();
    assert_eq!(handle.snapshot().await.unwrap().text, "3.00");
    handle.text_committed("lots").unwrap();
    assert_eq!(handle.snapshot().await.unwrap().text, "3.00");
    assert_eq!(view.last_text().as_deref(), Some("3.00"));

    handle.scroll(ScrollDirection::Down).unwrap();
    assert_eq!(handle.snapshot().await.unwrap().text, "2.90");

    handle.reset().unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "1.00");
    assert!(!snapshot.reset_enabled);
    assert_eq!(store.get_double(KEY).unwrap(), 1.0);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(applied_levels(&runner), vec!["60".to_string(), "20".to_string()]);

    handle.shutdown().await.unwrap();
    assert_eq!(store.subscriber_count(KEY), 0);
}

#[tokio::test(start_paused = true)]
async fn commit_only_config_from_yaml() {
    let config = AppConfig::from_yaml(
        "sync:\n  debounce_ms: 300\n  write_mode: commit_only\ndevices:\n  enabled: false\n",
    )
    .unwrap();
    assert_eq!(config.sync.write_mode, WriteMode::CommitOnly);

    let runner = probe_runner();
    let store = MemoryStore::with_value(KEY, 1.0);
    let (handle, _view) = spawn(&config, runner.clone(), store.clone()).await;

    handle.slider_changed(0.8).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "2.50");
    assert!(snapshot.settings_only());
    assert_eq!(store.get_double(KEY).unwrap(), 1.0);

    handle.apply_to_system().unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(store.get_double(KEY).unwrap(), 2.5);

    // Discovery was disabled, so no command ever ran
    assert!(runner.history().is_empty());
}

#[tokio::test]
async fn snapshot_serializes_to_json() {
    let config = AppConfig::default();
    let (handle, _view) = spawn(&config, probe_runner(), MemoryStore::with_value(KEY, 1.25)).await;

    let json = serde_json::to_value(handle.snapshot().await.unwrap()).unwrap();
    assert_eq!(json["text"], "1.25");
    assert_eq!(json["write_mode"], "every_change");
    assert_eq!(json["devices"][0], "dev:/dev/i2c-4");
    assert!(json["pending_apply"].is_null());

    handle.shutdown().await.unwrap();
}
