//! Revalidation event records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::types::{EventSource, EventType};

/// Maximum length kept for an error message on an event.
pub const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// One immutable entry in the revalidation log.
///
/// The [`warmed`](Self::warmed), [`failed`](Self::failed) and
/// [`skipped`](Self::skipped) constructors keep `duration_ms` on `warm` events
/// and `error` on `error` events only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevalidationEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub target_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RevalidationEvent {
    pub fn warmed(target_id: impl Into<String>, source: EventSource, duration_ms: u64) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            target_id: target_id.into(),
            event_type: EventType::Warm,
            source,
            duration_ms: Some(duration_ms),
            error: None,
        }
    }

    pub fn failed(target_id: impl Into<String>, source: EventSource, error: &str) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            target_id: target_id.into(),
            event_type: EventType::Error,
            source,
            duration_ms: None,
            error: Some(truncate_message(error)),
        }
    }

    pub fn skipped(target_id: impl Into<String>, source: EventSource) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            target_id: target_id.into(),
            event_type: EventType::Skip,
            source,
            duration_ms: None,
            error: None,
        }
    }

    /// Override the completion instant (used when replaying or in tests).
    pub fn at(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &message[..end])
}
