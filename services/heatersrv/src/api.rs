//! HTTP control surface
//!
//! Thin layer over the mode controller: `PUT /mode` accepts a mode switch
//! (acknowledging acceptance, not completion) and `GET /` renders current
//! state. Queue and bus errors never surface here; they are handled by the
//! backoff engine.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, put},
    Router,
};
use gea_bus::DeviceBus;
use serde_json::json;
use tracing::{error, info};

use crate::controller::ModeController;
use crate::modes::NORMAL_SLUG;

pub struct AppState {
    pub controller: ModeController,
    pub bus: Arc<dyn DeviceBus>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/mode", put(set_mode))
        .route("/health", get(health))
        .with_state(state)
}

/// Switch the operating mode. Plain-text body carries the mode slug.
///
/// Responds as soon as the command batch is queued and the expiration
/// timer (if the profile has a duration) is armed; queue completion is not
/// awaited. Unknown slugs are rejected with 404.
async fn set_mode(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, String) {
    let slug = body.trim();
    if slug.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing mode slug".to_string());
    }

    match state.controller.activate(slug).await {
        Ok(()) => {
            info!(slug, "mode switch accepted");
            (StatusCode::OK, String::new())
        }
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            error!("mode switch failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Render the status page: live tank temperature, active mode, and every
/// configured profile.
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let temp = match state.bus.read_temp_current().await {
        Ok(t) => t.to_string(),
        Err(e) => {
            error!("failed to read current temperature: {e}");
            "?".to_string()
        }
    };
    let active = state
        .controller
        .active_mode()
        .await
        .unwrap_or_else(|| NORMAL_SLUG.to_string());

    let mut rows = String::new();
    for (slug, profile) in state.controller.registry().iter() {
        let marker = if *slug == active { " (active)" } else { "" };
        let duration = profile
            .duration_hours
            .map(|h| format!("{h} h"))
            .unwrap_or_else(|| "-".to_string());
        rows.push_str(&format!(
            "<tr><td>{slug}{marker}</td><td>{}</td><td>{}&deg;F</td><td>{duration}</td></tr>\n",
            profile.mode, profile.temp
        ));
    }

    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>Water Heater</title></head><body>\n\
         <h1>Water Heater</h1>\n\
         <p>Current temperature: {temp}&deg;F</p>\n\
         <p>Active mode: {active}</p>\n\
         <table>\n<tr><th>Mode</th><th>Kind</th><th>Setpoint</th><th>Duration</th></tr>\n\
         {rows}</table>\n\
         </body></html>\n"
    ))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "heatersrv",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
