pub mod message;
pub mod progress;
pub mod room;

pub use message::*;
pub use progress::*;
pub use room::*;

use chrono::NaiveDateTime;

/// Storage format for timestamps (UTC, second precision).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_default()
}
