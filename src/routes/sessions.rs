use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::stream::{SessionInfo, SessionSummary};

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub active: Vec<SessionInfo>,
    pub recent: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "session", rename_all = "snake_case")]
pub enum SessionLookup {
    Active(SessionInfo),
    Finished(SessionSummary),
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    Json(SessionList {
        active: state.sessions.sessions(),
        recent: state.sessions.recent_summaries(),
    })
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionLookup>, AppError> {
    if let Some(info) = state.sessions.session(&session_id) {
        return Ok(Json(SessionLookup::Active(info)));
    }
    state
        .sessions
        .summary(&session_id)
        .map(|summary| Json(SessionLookup::Finished(summary)))
        .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))
}
