use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;

/// Payload of a single pushed event. Every session, bounded or not, emits
/// this exact field set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickEvent {
    pub count: u64,
    pub timestamp: String,
    pub message: String,
}

impl TickEvent {
    pub fn new(count: u64, message: &str) -> Self {
        Self::at(count, Local::now(), message)
    }

    pub fn at<Tz>(count: u64, time: DateTime<Tz>, message: &str) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            count,
            timestamp: time.format("%-I:%M:%S %p").to_string(),
            message: message.to_string(),
        }
    }
}

/// Encode an event as one text-event-stream frame: `data: <json>\n\n`.
///
/// serde_json escapes control characters inside strings, so the JSON body
/// never contains a raw newline and the trailing blank line is the only
/// frame delimiter.
pub fn encode_frame(event: &TickEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(format!("data: {json}\n\n"))
}
