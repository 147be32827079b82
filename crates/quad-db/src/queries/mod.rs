pub mod chat;
pub mod connections;
pub mod events;
pub mod notifications;
pub mod orgs;
pub mod registrations;
pub mod users;

use chrono::{SecondsFormat, Utc};

/// Timestamps are stored as RFC 3339 UTC text with fixed sub-second
/// precision, so lexicographic order equals chronological order.
pub(crate) fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
