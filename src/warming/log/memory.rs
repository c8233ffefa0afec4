use std::{collections::VecDeque, num::NonZeroUsize, sync::Mutex};

use async_trait::async_trait;

use crate::domain::events::RevalidationEvent;
use crate::warming::{error::LogStoreError, lock::mutex_lock};

use super::{EventFilter, EventLogStore};

const SOURCE: &str = "warming::log::memory";

/// Bounded in-process ring buffer. The oldest event is dropped once
/// `capacity` is reached, so stats cover exactly the retained window.
pub struct MemoryEventLog {
    events: Mutex<VecDeque<RevalidationEvent>>,
    capacity: NonZeroUsize,
}

impl MemoryEventLog {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.get().min(4096))),
            capacity,
        }
    }

    pub(crate) fn push(&self, event: RevalidationEvent) {
        let mut events = mutex_lock(&self.events, SOURCE, "push");
        if events.len() == self.capacity.get() {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub(crate) fn select(&self, filter: &EventFilter) -> Vec<RevalidationEvent> {
        mutex_lock(&self.events, SOURCE, "select")
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .take(filter.cap())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.events, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventLogStore for MemoryEventLog {
    async fn append(&self, event: RevalidationEvent) -> Result<(), LogStoreError> {
        self.push(event);
        Ok(())
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError> {
        Ok(self.select(filter))
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::domain::types::{EventSource, EventType};

    fn log(capacity: usize) -> MemoryEventLog {
        MemoryEventLog::new(NonZeroUsize::new(capacity).expect("non-zero capacity"))
    }

    #[tokio::test]
    async fn limit_returns_most_recent_first() {
        let store = log(16);
        for i in 0..5 {
            store
                .append(RevalidationEvent::warmed(format!("/{i}"), EventSource::Manual, i))
                .await
                .expect("append");
        }

        let filter = EventFilter {
            limit: NonZeroUsize::new(2),
            ..EventFilter::default()
        };
        let events = store.query(&filter).await.expect("query");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].target_id, "/4");
        assert_eq!(events[1].target_id, "/3");
    }

    #[tokio::test]
    async fn oldest_events_fall_off_at_capacity() {
        let store = log(3);
        for i in 0..5 {
            store
                .append(RevalidationEvent::skipped(format!("/{i}"), EventSource::Manual))
                .await
                .expect("append");
        }

        let ids: Vec<String> = store
            .query(&EventFilter::unbounded())
            .await
            .expect("query")
            .into_iter()
            .map(|e| e.target_id)
            .collect();
        assert_eq!(ids, vec!["/4", "/3", "/2"]);
    }

    #[tokio::test]
    async fn last_success_ignores_errors() {
        let store = log(8);
        store
            .append(RevalidationEvent::warmed("/", EventSource::Smart, 3))
            .await
            .expect("append");
        store
            .append(RevalidationEvent::failed("/", EventSource::Smart, "boom"))
            .await
            .expect("append");

        let last = store
            .last_success("/")
            .await
            .expect("query")
            .expect("has success");
        assert_eq!(last.event_type, EventType::Warm);
        assert!(store.last_success("/other").await.expect("query").is_none());
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = log(4);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.events.lock().expect("lock should be acquired");
            panic!("poison event lock");
        }));

        store.push(RevalidationEvent::skipped("/", EventSource::Manual));
        assert_eq!(store.len(), 1);
    }
}
