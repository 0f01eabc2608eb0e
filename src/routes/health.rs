use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;
use crate::stream::{Limit, SessionStats};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub default_limit: Limit,
    pub tick_interval_ms: u64,
    pub sessions: SessionStats,
}

pub async fn index() -> &'static str {
    "tickstream is running. GET /events opens a text/event-stream feed."
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let manager = &state.sessions;
    let config = manager.config();
    let status = if manager.is_shutting_down() {
        "shutting_down"
    } else {
        "healthy"
    };
    Json(Health {
        status,
        service: env!("CARGO_PKG_NAME"),
        default_limit: config.limit,
        tick_interval_ms: u64::try_from(config.tick_interval.as_millis()).unwrap_or(u64::MAX),
        sessions: manager.stats(),
    })
}

pub async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "git_sha": env!("GIT_SHA"),
    }))
}
