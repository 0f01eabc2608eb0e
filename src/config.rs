use std::time::Duration;

use crate::stream::Limit;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MESSAGE: &str = "Server-sent event";

/// Per-session streaming behavior shared by every session the server opens.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub limit: Limit,
    pub tick_interval: Duration,
    pub write_timeout: Duration,
    /// Maximum concurrently active sessions, 0 means no cap.
    pub max_sessions: usize,
    pub message: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            limit: Limit::Bounded(5),
            tick_interval: Duration::from_millis(1000),
            write_timeout: Duration::from_secs(30),
            max_sessions: 0,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub stream: StreamConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = StreamConfig::default();

        let limit = match std::env::var("TICKSTREAM_EVENT_LIMIT") {
            Ok(v) if v.trim() == "0" => Limit::Unbounded,
            Ok(v) => match v.parse::<Limit>() {
                Ok(limit) => limit,
                Err(e) => {
                    tracing::warn!("{e}, using default of {}", defaults.limit);
                    defaults.limit
                }
            },
            Err(_) => defaults.limit,
        };

        let tick_interval = std::env::var("TICKSTREAM_TICK_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let write_timeout = std::env::var("TICKSTREAM_WRITE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.write_timeout);

        let max_sessions = std::env::var("TICKSTREAM_MAX_SESSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_sessions);

        let message = std::env::var("TICKSTREAM_MESSAGE")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.message);

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            stream: StreamConfig {
                limit,
                tick_interval,
                write_timeout,
                max_sessions,
                message,
            },
        }
    }
}
