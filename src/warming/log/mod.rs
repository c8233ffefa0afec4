//! Event log store.
//!
//! Append-only record of every warm, error and skip outcome. The executor,
//! strategies, stats and health only see the [`EventLogStore`] trait, so the
//! in-memory ring buffer can be swapped for the JSON-lines file store (or any
//! other backend) without touching them.

mod fallback;
mod jsonl;
mod memory;

use std::num::NonZeroUsize;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    events::RevalidationEvent,
    types::{EventSource, EventType},
};

use super::error::LogStoreError;

pub use fallback::FallbackEventLog;
pub use jsonl::JsonlEventLog;
pub use memory::MemoryEventLog;

pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Query filters. Every field is optional; unset fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    #[serde(rename = "target", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Inclusive lower bound on the event timestamp.
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub since: Option<OffsetDateTime>,
    /// `None` returns every match.
    pub limit: Option<NonZeroUsize>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            event_type: None,
            source: None,
            target_id: None,
            since: None,
            limit: NonZeroUsize::new(DEFAULT_QUERY_LIMIT),
        }
    }
}

impl EventFilter {
    /// A filter without a result cap.
    pub fn unbounded() -> Self {
        Self {
            limit: None,
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &RevalidationEvent) -> bool {
        self.event_type.is_none_or(|kind| event.event_type == kind)
            && self.source.is_none_or(|source| event.source == source)
            && self
                .target_id
                .as_deref()
                .is_none_or(|id| event.target_id == id)
            && self.since.is_none_or(|since| event.timestamp >= since)
    }

    pub fn cap(&self) -> usize {
        self.limit.map_or(usize::MAX, NonZeroUsize::get)
    }
}

#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Append one event. Visible to every query issued after this returns.
    async fn append(&self, event: RevalidationEvent) -> Result<(), LogStoreError>;

    /// Matching events, most recent (by insertion) first.
    async fn query(&self, filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError>;

    /// The most recent successful `warm` event for a target.
    async fn last_success(
        &self,
        target_id: &str,
    ) -> Result<Option<RevalidationEvent>, LogStoreError> {
        let filter = EventFilter {
            event_type: Some(EventType::Warm),
            target_id: Some(target_id.to_string()),
            limit: NonZeroUsize::new(1),
            ..EventFilter::default()
        };
        Ok(self.query(&filter).await?.into_iter().next())
    }
}
