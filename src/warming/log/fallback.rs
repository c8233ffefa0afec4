use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;

use crate::domain::events::RevalidationEvent;
use crate::warming::error::LogStoreError;

use super::{EventFilter, EventLogStore, memory::MemoryEventLog};

const METRIC_LOG_FALLBACK_TOTAL: &str = "prewarm_event_log_fallback_total";

/// Keeps runs alive through transient primary-store failures.
///
/// Failed appends land in a local ring buffer. Query results merge both
/// stores by timestamp, since insertion order cannot be compared across them.
pub struct FallbackEventLog {
    primary: Arc<dyn EventLogStore>,
    fallback: MemoryEventLog,
}

impl FallbackEventLog {
    pub fn new(primary: Arc<dyn EventLogStore>, capacity: NonZeroUsize) -> Self {
        Self {
            primary,
            fallback: MemoryEventLog::new(capacity),
        }
    }

    /// Number of events currently held only by the fallback buffer.
    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }
}

#[async_trait]
impl EventLogStore for FallbackEventLog {
    async fn append(&self, event: RevalidationEvent) -> Result<(), LogStoreError> {
        match self.primary.append(event.clone()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    target = "prewarm::event_log",
                    target_id = %event.target_id,
                    error = %err,
                    "primary event log append failed; kept event in local fallback"
                );
                counter!(METRIC_LOG_FALLBACK_TOTAL).increment(1);
                self.fallback.push(event);
                Ok(())
            }
        }
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError> {
        let local = self.fallback.select(filter);
        let primary = match self.primary.query(filter).await {
            Ok(events) => events,
            Err(err) => {
                warn!(
                    target = "prewarm::event_log",
                    error = %err,
                    "primary event log query failed; serving local fallback"
                );
                return Ok(local);
            }
        };
        if local.is_empty() {
            return Ok(primary);
        }

        let mut merged = primary;
        merged.extend(local);
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged.truncate(filter.cap());
        Ok(merged)
    }
}
