//! Stats aggregation over the event log.
//!
//! Stats cover every event the store still returns for an unbounded query.
//! For the in-memory and JSON-lines stores that is the retained ring buffer
//! (`[log] capacity`), not the whole history.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    events::RevalidationEvent,
    types::{EventSource, EventType},
};

use super::{
    error::LogStoreError,
    log::{EventFilter, EventLogStore},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub warm: u64,
    pub error: u64,
    pub skip: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub manual: u64,
    pub critical: u64,
    pub smart: u64,
    pub deployment: u64,
    pub scheduled: u64,
}

impl SourceCounts {
    fn bump(&mut self, source: EventSource) {
        let slot = match source {
            EventSource::Manual => &mut self.manual,
            EventSource::Critical => &mut self.critical,
            EventSource::Smart => &mut self.smart,
            EventSource::Deployment => &mut self.deployment,
            EventSource::Scheduled => &mut self.scheduled,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_events: u64,
    pub by_type: TypeCounts,
    pub by_source: SourceCounts,
    /// `warm / (warm + error)` as a percentage; `None` when neither occurred.
    pub success_rate: Option<f64>,
    /// Mean `durationMs` of `warm` events, 0 when there are none.
    pub average_duration_ms: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_event_at: Option<OffsetDateTime>,
}

impl Stats {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a RevalidationEvent>) -> Self {
        let mut stats = Stats::default();
        let mut duration_total: u128 = 0;
        let mut duration_count: u128 = 0;

        for event in events {
            stats.total_events += 1;
            match event.event_type {
                EventType::Warm => {
                    stats.by_type.warm += 1;
                    if let Some(ms) = event.duration_ms {
                        duration_total += u128::from(ms);
                        duration_count += 1;
                    }
                }
                EventType::Error => stats.by_type.error += 1,
                EventType::Skip => stats.by_type.skip += 1,
            }
            stats.by_source.bump(event.source);
            if stats.last_event_at.is_none_or(|last| event.timestamp > last) {
                stats.last_event_at = Some(event.timestamp);
            }
        }

        stats.success_rate = success_rate(stats.by_type.warm, stats.by_type.error);
        if duration_count > 0 {
            let mean = (duration_total + duration_count / 2) / duration_count;
            stats.average_duration_ms = u64::try_from(mean).unwrap_or(u64::MAX);
        }
        stats
    }
}

fn success_rate(warm: u64, error: u64) -> Option<f64> {
    let attempted = warm + error;
    if attempted == 0 {
        return None;
    }
    let rate = warm as f64 / attempted as f64 * 100.0;
    Some((rate * 100.0).round() / 100.0)
}

pub struct StatsAggregator {
    store: Arc<dyn EventLogStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn EventLogStore>) -> Self {
        Self { store }
    }

    pub async fn compute_stats(&self) -> Result<Stats, LogStoreError> {
        let events = self.store.query(&EventFilter::unbounded()).await?;
        Ok(Stats::from_events(&events))
    }
}
