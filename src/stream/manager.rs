use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::event::{encode_frame, TickEvent};
use super::session::{AbortReason, Limit, Session, SessionState, Tick};
use crate::config::StreamConfig;
use crate::error::AppError;
use crate::snowflake;

/// Frames buffered between a session task and the HTTP body draining it.
pub const FRAME_BUFFER: usize = 8;

/// Finished sessions kept for `/sessions`.
pub const RECENT_SUMMARIES: usize = 128;

/// Registry entry for an active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub limit: Limit,
    pub opened_at: DateTime<Utc>,
}

/// Recorded once per session, on its terminal transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub state: SessionState,
    pub sequence: u64,
    pub limit: Limit,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active: usize,
    pub completed: u64,
    pub aborted: u64,
}

/// Returned by [`SessionManager::open_session`]. The receiver yields encoded
/// frames and ends when the session reaches a terminal state. Dropping it is
/// how a disconnect reaches the session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: String,
    pub frames: mpsc::Receiver<String>,
}

/// Owns the lifecycle of every streaming session.
///
/// Each session runs as its own task holding its timer and the sending half
/// of its frame channel. Sessions share nothing but the registry and counters
/// kept here for diagnostics.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: StreamConfig,
    sessions: DashMap<String, SessionInfo>,
    recent: Mutex<VecDeque<SessionSummary>>,
    active: AtomicUsize,
    completed: AtomicU64,
    aborted: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl SessionManager {
    pub fn new(config: StreamConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                sessions: DashMap::new(),
                recent: Mutex::new(VecDeque::with_capacity(RECENT_SUMMARIES)),
                active: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                aborted: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// Open a session and start its timer. `limit` overrides the configured
    /// default. Must be called from within a tokio runtime.
    pub fn open_session(&self, limit: Option<Limit>) -> Result<SessionHandle, AppError> {
        // Subscribe before checking so a shutdown racing with this call is
        // still observed by the session task.
        let shutdown = self.inner.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(AppError::Unavailable("server is shutting down".to_string()));
        }
        self.reserve_slot()?;

        let id = snowflake::generate();
        let limit = limit.unwrap_or(self.inner.config.limit);
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);

        self.inner.sessions.insert(
            id.clone(),
            SessionInfo {
                id: id.clone(),
                limit,
                opened_at: Utc::now(),
            },
        );

        let period = self.inner.config.tick_interval;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let actor = SessionActor {
            session: Session::new(id.clone(), limit),
            timer: Some(timer),
            sink: Some(tx),
            shutdown,
            started: Instant::now(),
            inner: Arc::clone(&self.inner),
        };

        tracing::info!(session_id = %id, %limit, "stream session opened");
        tokio::spawn(actor.run());

        Ok(SessionHandle { id, frames: rx })
    }

    fn reserve_slot(&self) -> Result<(), AppError> {
        let max = self.inner.config.max_sessions;
        if max == 0 {
            self.inner.active.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.inner
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                tracing::warn!("rejecting stream session, {max} already active");
                AppError::Unavailable(format!("session limit of {max} reached"))
            })
    }

    pub fn session(&self, id: &str) -> Option<SessionInfo> {
        self.inner.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Active sessions, oldest first.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Summary of a finished session, if it is still among the recent ones.
    pub fn summary(&self, id: &str) -> Option<SessionSummary> {
        self.inner
            .recent()
            .iter()
            .rev()
            .find(|summary| summary.id == id)
            .cloned()
    }

    /// Most recently finished sessions, newest first.
    pub fn recent_summaries(&self) -> Vec<SessionSummary> {
        self.inner.recent().iter().rev().cloned().collect()
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active: self.inner.active.load(Ordering::SeqCst),
            completed: self.inner.completed.load(Ordering::SeqCst),
            aborted: self.inner.aborted.load(Ordering::SeqCst),
        }
    }

    /// Abort every active session and refuse new ones.
    pub fn shutdown(&self) {
        let active = self.active_sessions();
        self.inner.shutdown.send_replace(true);
        tracing::info!("closing {active} active stream session(s)");
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}

impl Inner {
    fn recent(&self) -> std::sync::MutexGuard<'_, VecDeque<SessionSummary>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retire(&self, session: &Session, elapsed: Duration) {
        let state = session.state();
        let id = session.id();
        let events = session.sequence();

        match state {
            SessionState::Active => return,
            SessionState::Completed => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                tracing::info!(session_id = %id, events, "stream session completed");
            }
            SessionState::Aborted(reason) => {
                self.aborted.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    session_id = %id,
                    events,
                    %reason,
                    "stream session aborted before completion"
                );
            }
        }

        let summary = SessionSummary {
            id: id.to_string(),
            state,
            sequence: events,
            limit: session.limit(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };
        {
            let mut recent = self.recent();
            if recent.len() == RECENT_SUMMARIES {
                recent.pop_front();
            }
            recent.push_back(summary);
        }

        self.sessions.remove(id);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Wake {
    Tick,
    Disconnected,
    Shutdown,
}

/// The task driving one session. Ticks, disconnects and shutdown are all
/// handled on this one task, so they never interleave.
struct SessionActor {
    session: Session,
    timer: Option<Interval>,
    sink: Option<mpsc::Sender<String>>,
    shutdown: watch::Receiver<bool>,
    started: Instant,
    inner: Arc<Inner>,
}

impl SessionActor {
    async fn run(mut self) {
        loop {
            let wake = {
                let (Some(timer), Some(sink)) = (self.timer.as_mut(), self.sink.as_ref()) else {
                    break;
                };
                let shutdown = &mut self.shutdown;
                tokio::select! {
                    _ = timer.tick() => Wake::Tick,
                    _ = sink.closed() => Wake::Disconnected,
                    _ = shutdown.changed() => Wake::Shutdown,
                }
            };

            match wake {
                Wake::Tick => self.on_tick().await,
                Wake::Disconnected => self.on_client_disconnect(AbortReason::ClientGone),
                Wake::Shutdown => self.on_client_disconnect(AbortReason::Shutdown),
            }
        }
    }

    async fn on_tick(&mut self) {
        match self.session.on_tick() {
            Tick::Idle => {}
            Tick::Complete => self.teardown(),
            Tick::Emit(count) => self.emit(count).await,
        }
    }

    async fn emit(&mut self, count: u64) {
        let event = TickEvent::new(count, &self.inner.config.message);
        let frame = match encode_frame(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(session_id = %self.session.id(), "failed to encode event: {e}");
                self.on_client_disconnect(AbortReason::Internal);
                return;
            }
        };

        let write_timeout = self.inner.config.write_timeout;
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let shutdown = &mut self.shutdown;
        // A client that stops reading must not hold shutdown open.
        let sent = tokio::select! {
            sent = sink.send_timeout(frame, write_timeout) => Some(sent),
            _ = shutdown.changed() => None,
        };

        match sent {
            None => self.on_client_disconnect(AbortReason::Shutdown),
            Some(Ok(())) => {
                tracing::trace!(session_id = %self.session.id(), count, "event pushed");
            }
            Some(Err(SendTimeoutError::Closed(_))) => {
                self.on_client_disconnect(AbortReason::ClientGone);
            }
            Some(Err(SendTimeoutError::Timeout(_))) => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    "client has not read a frame in {write_timeout:?}"
                );
                self.on_client_disconnect(AbortReason::Stalled);
            }
        }
    }

    fn on_client_disconnect(&mut self, reason: AbortReason) {
        if self.session.abort(reason) {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        // Timer and sink are released before the session is reported, so
        // nothing fires or is written past the terminal transition.
        self.timer = None;
        self.sink = None;
        self.inner.retire(&self.session, self.started.elapsed());
    }
}

impl Drop for SessionActor {
    fn drop(&mut self) {
        // Task cancelled mid-session (runtime shutting down).
        if self.session.is_active() {
            self.on_client_disconnect(AbortReason::Shutdown);
        }
    }
}
