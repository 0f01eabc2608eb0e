use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How many events a session emits before the server closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Bounded(u64),
    Unbounded,
}

impl Limit {
    pub fn is_reached(&self, sequence: u64) -> bool {
        match self {
            Limit::Bounded(max) => sequence >= *max,
            Limit::Unbounded => false,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Bounded(max) => write!(f, "{max}"),
            Limit::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLimitError(String);

impl fmt::Display for ParseLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid limit '{}': expected a positive integer or 'unbounded'",
            self.0
        )
    }
}

impl std::error::Error for ParseLimitError {}

impl FromStr for Limit {
    type Err = ParseLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unbounded") {
            return Ok(Limit::Unbounded);
        }
        match trimmed.parse::<u64>() {
            Ok(max) if max > 0 => Ok(Limit::Bounded(max)),
            _ => Err(ParseLimitError(s.to_string())),
        }
    }
}

/// Why a session ended before reaching its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The client closed the connection, or a write found it closed.
    ClientGone,
    /// The client stopped draining frames for longer than the write timeout.
    Stalled,
    /// The server is shutting down.
    Shutdown,
    /// A frame could not be encoded.
    Internal,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortReason::ClientGone => "client disconnected",
            AbortReason::Stalled => "client stalled",
            AbortReason::Shutdown => "server shutdown",
            AbortReason::Internal => "internal error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Completed,
    Aborted(AbortReason),
}

/// Outcome of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Emit the event carrying this sequence number.
    Emit(u64),
    /// The limit was reached on an earlier tick; the session is now completed.
    Complete,
    /// The session is already terminal.
    Idle,
}

/// Lifecycle state of one streaming connection.
///
/// Pure bookkeeping: the owning task drives it with [`Session::on_tick`] and
/// [`Session::abort`] and performs the I/O each transition calls for.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    sequence: u64,
    limit: Limit,
    state: SessionState,
}

impl Session {
    pub fn new(id: String, limit: Limit) -> Self {
        Self {
            id,
            sequence: 0,
            limit,
            state: SessionState::Active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn on_tick(&mut self) -> Tick {
        if !self.is_active() {
            return Tick::Idle;
        }
        if self.limit.is_reached(self.sequence) {
            self.state = SessionState::Completed;
            return Tick::Complete;
        }
        self.sequence += 1;
        Tick::Emit(self.sequence)
    }

    /// Force the session into `Aborted`. Returns false if it was already
    /// terminal, in which case nothing changes.
    pub fn abort(&mut self, reason: AbortReason) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = SessionState::Aborted(reason);
        true
    }
}
