use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// 2025-01-01T00:00:00Z
const EPOCH: u64 = 1_735_689_600_000;
const SEQUENCE_BITS: u32 = 22;

static LAST_ID: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(EPOCH)
}

/// Time-ordered session id. Ids generated within the same millisecond take
/// the next free sequence slot, so the result is strictly increasing across
/// threads.
pub fn generate() -> String {
    let candidate = now_ms().saturating_sub(EPOCH) << SEQUENCE_BITS;
    let mut last = LAST_ID.load(Ordering::SeqCst);
    loop {
        let next = candidate.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next.to_string(),
            Err(actual) => last = actual,
        }
    }
}
