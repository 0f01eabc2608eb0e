use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use futures_util::stream;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::stream::Limit;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<String>,
}

/// GET /events, one streaming session per request.
///
/// The response head goes out as soon as the handler returns; frames follow
/// as body chunks until the session completes or the client goes away.
pub async fn open_stream(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Result<Response, AppError> {
    let limit = params
        .limit
        .as_deref()
        .map(str::parse::<Limit>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let handle = state.sessions.open_session(limit)?;

    // Dropping the body drops the receiver, which the session task sees as
    // a client disconnect.
    let frames = stream::unfold(handle.frames, |mut rx| async move {
        rx.recv()
            .await
            .map(|frame| (Ok::<_, Infallible>(frame), rx))
    });

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .header("X-Session-Id", &handle.id)
        .body(Body::from_stream(frames))?;

    Ok(response)
}
