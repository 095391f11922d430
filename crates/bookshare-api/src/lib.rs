pub mod auth;
pub mod blogs;
pub mod chat;
pub mod error;
pub mod form;
pub mod listings;
pub mod middleware;
pub mod notes;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod routes;
pub mod uploads;
pub mod users;
pub mod wishlist;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// Parse a stored UUID, logging and defaulting on corruption rather than
/// failing the whole response.
pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

/// Parse a stored RFC 3339 timestamp, logging and defaulting on corruption.
pub(crate) fn parse_ts(s: &str, what: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} timestamp '{}': {}", what, s, e);
        DateTime::default()
    })
}
