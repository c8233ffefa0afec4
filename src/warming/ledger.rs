//! Latest finished run per source.
//!
//! Process-local; feeds the "time since last run" part of the health
//! snapshot. Runs are not persisted, so a restart starts with an empty ledger.

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    runs::{RunSummary, WarmingRun},
    types::EventSource,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: Uuid,
    pub source: EventSource,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub summary: RunSummary,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
pub struct RunLedger {
    latest: DashMap<EventSource, RunRecord>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a finished run. Unfinished runs and runs older than the one
    /// already held for the source are ignored.
    pub fn record(&self, run: &WarmingRun) {
        let Some(finished_at) = run.finished_at else {
            return;
        };
        let record = RunRecord {
            run_id: run.id,
            source: run.source,
            finished_at,
            summary: run.summary,
            cancelled: run.cancelled,
        };
        self.latest
            .entry(run.source)
            .and_modify(|current| {
                if current.finished_at <= finished_at {
                    *current = record.clone();
                }
            })
            .or_insert(record);
    }

    pub fn latest(&self, source: EventSource) -> Option<RunRecord> {
        self.latest.get(&source).map(|entry| entry.value().clone())
    }

    /// Records in [`EventSource::ALL`] order.
    pub fn snapshot(&self) -> Vec<RunRecord> {
        EventSource::ALL
            .into_iter()
            .filter_map(|source| self.latest(source))
            .collect()
    }
}
