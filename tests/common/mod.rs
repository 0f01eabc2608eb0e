#![allow(dead_code)]

use std::time::Duration;

use tickstream::config::StreamConfig;
use tickstream::routes;
use tickstream::state::AppState;
use tickstream::stream::{Limit, SessionSummary};

/// Test server owning its own session manager.
/// Each instance is isolated, safe for parallel tests.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    /// A server ticking every 10ms with a default limit of 5 events.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the base URL.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}", addr.port())
    }

    /// Waits until the session with `id` has reached a terminal state.
    pub async fn wait_for_summary(&self, id: &str) -> SessionSummary {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(summary) = self.state.sessions.summary(id) {
                    return summary;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for session summary")
    }
}

pub fn fast_config() -> StreamConfig {
    StreamConfig {
        limit: Limit::Bounded(5),
        tick_interval: Duration::from_millis(10),
        write_timeout: Duration::from_secs(2),
        max_sessions: 0,
        message: "test event".to_string(),
    }
}

pub async fn test_app() -> axum::Router {
    TestServer::new().router()
}

pub fn session_id<B>(response: &http::Response<B>) -> String {
    response
        .headers()
        .get("x-session-id")
        .expect("x-session-id header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Split a text-event-stream body into its JSON payloads, asserting that
/// every frame is exactly `data: <json>\n\n`.
pub fn parse_frames(body: &str) -> Vec<serde_json::Value> {
    assert!(
        body.is_empty() || body.ends_with("\n\n"),
        "stream ended mid-frame: {body:?}"
    );
    body.split_terminator("\n\n")
        .map(|frame| {
            let json = frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("frame missing data prefix: {frame:?}"));
            assert!(!json.contains('\n'), "frame has embedded newline: {frame:?}");
            serde_json::from_str(json).unwrap_or_else(|e| panic!("invalid JSON {json:?}: {e}"))
        })
        .collect()
}

pub fn counts(frames: &[serde_json::Value]) -> Vec<u64> {
    frames
        .iter()
        .map(|f| f["count"].as_u64().expect("count field"))
        .collect()
}
