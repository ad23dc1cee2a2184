//! Startup reconciliation integration tests

use std::sync::Arc;
use std::time::Duration;

use gea_bus::{BusCall, MockBus};
use tempfile::tempdir;
use tokio::sync::RwLock;

use heatersrv::bootstrap;
use heatersrv::controller::ModeController;
use heatersrv::modes::{HeaterMode, ModeRegistry, NORMAL_SLUG};
use heatersrv::queue::QueueEngine;

struct Harness {
    controller: ModeController,
    bus: Arc<MockBus>,
    _dir: tempfile::TempDir,
}

/// Wire up the full startup path against a scripted device and an optional
/// pre-seeded mode store.
async fn start(bus: MockBus, modes_toml: Option<&str>) -> heatersrv::Result<Harness> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("modes.toml");
    if let Some(content) = modes_toml {
        std::fs::write(&path, content).expect("seed mode store");
    }

    let bus = Arc::new(bus);
    let live = bootstrap::read_live_state(bus.as_ref()).await?;
    let (registry, bootstrapped) = ModeRegistry::load(&path, live.mode, live.temp)?;

    let active_mode = Arc::new(RwLock::new(None));
    let queue = QueueEngine::new(Duration::from_millis(50));
    queue.spawn_drain(bus.clone(), active_mode.clone());

    let controller = ModeController::new(Arc::new(registry), queue, active_mode);
    bootstrap::reconcile(&controller, bootstrapped, live).await?;

    Ok(Harness {
        controller,
        bus,
        _dir: dir,
    })
}

/// Bus calls made after startup's two initial reads
fn commands_issued(bus: &MockBus) -> Vec<BusCall> {
    let calls = bus.calls();
    assert_eq!(calls[0], BusCall::ReadModeSetting);
    assert_eq!(calls[1], BusCall::ReadTempSetting);
    calls[2..].to_vec()
}

#[tokio::test(start_paused = true)]
async fn drifted_device_is_forced_back_to_normal() {
    // Registry says normal = {hybrid, 120}; device reports electric/115
    // (raw mode code 2 decodes to electric).
    let harness = start(
        MockBus::with_readings(2, 115),
        Some("[normal]\nmode = \"hybrid\"\ntemp = 120\n"),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        commands_issued(&harness.bus),
        vec![BusCall::WriteMode(0), BusCall::WriteTankTemp(120)]
    );
    assert_eq!(
        harness.controller.active_mode().await.as_deref(),
        Some(NORMAL_SLUG)
    );
}

#[tokio::test(start_paused = true)]
async fn matching_device_issues_no_commands() {
    // Raw code 1 decodes to hybrid, matching the configured normal.
    let harness = start(
        MockBus::with_readings(1, 120),
        Some("[normal]\nmode = \"hybrid\"\ntemp = 120\n"),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(commands_issued(&harness.bus), Vec::<BusCall>::new());
    assert_eq!(
        harness.controller.active_mode().await.as_deref(),
        Some(NORMAL_SLUG)
    );
}

#[tokio::test(start_paused = true)]
async fn temperature_drift_alone_triggers_reconciliation() {
    let harness = start(
        MockBus::with_readings(1, 110),
        Some("[normal]\nmode = \"hybrid\"\ntemp = 120\n"),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        commands_issued(&harness.bus),
        vec![BusCall::WriteMode(0), BusCall::WriteTankTemp(120)]
    );
}

#[tokio::test(start_paused = true)]
async fn bootstrapped_normal_issues_no_commands() {
    // Empty store: normal is synthesized from the live readings, which by
    // construction match the device, so nothing is queued.
    let harness = start(MockBus::with_readings(3, 130), None).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(commands_issued(&harness.bus), Vec::<BusCall>::new());
    let normal = harness.controller.registry().normal().unwrap();
    assert_eq!(normal.mode, HeaterMode::HeatPump);
    assert_eq!(normal.temp, 130);
    assert_eq!(
        harness.controller.active_mode().await.as_deref(),
        Some(NORMAL_SLUG)
    );
}

#[tokio::test]
async fn failed_startup_read_is_fatal() {
    let bus = MockBus::new();
    bus.fail_read_mode_setting(1);
    let err = bootstrap::read_live_state(&bus).await.unwrap_err();
    assert!(err.to_string().contains("reading initial mode"));

    let bus = MockBus::new();
    bus.fail_read_temp_setting(1);
    let err = bootstrap::read_live_state(&bus).await.unwrap_err();
    assert!(err.to_string().contains("reading initial temperature"));
}

#[tokio::test]
async fn undecodable_mode_code_is_fatal() {
    // Raw 0 would underflow the off-by-one correction.
    let bus = MockBus::with_readings(0, 120);
    assert!(bootstrap::read_live_state(&bus).await.is_err());
}
