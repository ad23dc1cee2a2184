//! Control surface integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use gea_bus::{BusCall, MockBus};
use http_body_util::BodyExt;
use tempfile::tempdir;
use tokio::sync::RwLock;
use tower::ServiceExt;

use heatersrv::api::{self, AppState};
use heatersrv::controller::ModeController;
use heatersrv::modes::{ModeRegistry, NORMAL_SLUG};
use heatersrv::queue::QueueEngine;

const MODES_TOML: &str = "\
[normal]
mode = \"hybrid\"
temp = 120

[heat-pump]
mode = \"heat-pump\"
temp = 130
duration_hours = 4.0

[boost]
mode = \"high-demand\"
temp = 140
duration_hours = 0.5
";

struct Harness {
    app: Router,
    controller: ModeController,
    bus: Arc<MockBus>,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("modes.toml");
    std::fs::write(&path, MODES_TOML).expect("seed mode store");

    // Live readings match the configured normal so load never bootstraps.
    let (registry, bootstrapped) =
        ModeRegistry::load(&path, heatersrv::HeaterMode::Hybrid, 120).expect("load registry");
    assert!(!bootstrapped);

    let bus = Arc::new(MockBus::with_readings(1, 120));
    let active_mode = Arc::new(RwLock::new(Some(NORMAL_SLUG.to_string())));
    let queue = QueueEngine::new(Duration::from_millis(50));
    queue.spawn_drain(bus.clone(), active_mode.clone());

    let controller = ModeController::new(Arc::new(registry), queue, active_mode);
    let state = Arc::new(AppState {
        controller: controller.clone(),
        bus: bus.clone(),
    });

    Harness {
        app: api::router(state),
        controller,
        bus,
        _dir: dir,
    }
}

async fn put_mode(app: &Router, slug: &str) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/mode")
                .body(Body::from(slug.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    response.status()
}

async fn get_body(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

#[tokio::test(start_paused = true)]
async fn put_mode_queues_batch_and_arms_expiration() {
    let h = harness().await;

    let status = put_mode(&h.app, "heat-pump").await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.controller.expiration_pending().await);

    // The batch drains: mode write, setpoint write, active-mode record.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.bus.calls(),
        vec![BusCall::WriteMode(2), BusCall::WriteTankTemp(130)]
    );
    assert_eq!(h.controller.active_mode().await.as_deref(), Some("heat-pump"));

    // After the 4 hour window the appliance reverts to normal on its own.
    tokio::time::sleep(Duration::from_secs(4 * 3600)).await;
    assert!(!h.controller.expiration_pending().await);
    let calls = h.bus.calls();
    assert_eq!(
        calls[2..],
        [BusCall::WriteMode(0), BusCall::WriteTankTemp(120)]
    );
    assert_eq!(h.controller.active_mode().await.as_deref(), Some(NORMAL_SLUG));
}

#[tokio::test(start_paused = true)]
async fn new_switch_cancels_pending_expiration() {
    let h = harness().await;

    assert_eq!(put_mode(&h.app, "boost").await, StatusCode::OK);
    assert!(h.controller.expiration_pending().await);

    // Switch again before the 30 minute window runs out; the first timer
    // must be cancelled, leaving only heat-pump's 4 hour window.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(put_mode(&h.app, "heat-pump").await, StatusCode::OK);

    // Past boost's original expiry: no revert must have happened.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.controller.active_mode().await.as_deref(), Some("heat-pump"));
    assert!(h.controller.expiration_pending().await);
}

#[tokio::test(start_paused = true)]
async fn unknown_slug_is_rejected_with_404() {
    let h = harness().await;

    let status = put_mode(&h.app, "vacation").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Fail-closed: nothing queued, no timer armed, active mode untouched.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.bus.calls(), Vec::<BusCall>::new());
    assert!(!h.controller.expiration_pending().await);
    assert_eq!(h.controller.active_mode().await.as_deref(), Some(NORMAL_SLUG));
}

#[tokio::test(start_paused = true)]
async fn empty_body_is_a_bad_request() {
    let h = harness().await;
    assert_eq!(put_mode(&h.app, "").await, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn index_renders_state_and_registry() {
    let h = harness().await;
    h.bus.set_temp_current(118);

    let (status, body) = get_body(&h.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Current temperature: 118"));
    assert!(body.contains("normal (active)"));
    assert!(body.contains("heat-pump"));
    assert!(body.contains("Heat Pump"));
    assert!(body.contains("boost"));
}

#[tokio::test(start_paused = true)]
async fn index_shows_placeholder_when_temperature_read_fails() {
    let h = harness().await;
    h.bus.fail_read_temp_current(1);

    let (status, body) = get_body(&h.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Current temperature: ?"));
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let h = harness().await;
    let (status, body) = get_body(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"status\":\"healthy\""));
    assert!(body.contains("heatersrv"));
}
