pub mod event;
pub mod manager;
pub mod session;

pub use event::{encode_frame, TickEvent};
pub use manager::{SessionHandle, SessionInfo, SessionManager, SessionStats, SessionSummary};
pub use session::{AbortReason, Limit, Session, SessionState, Tick};
