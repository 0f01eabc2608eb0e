use crate::config::StreamConfig;
use crate::stream::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            sessions: SessionManager::new(config),
        }
    }
}
