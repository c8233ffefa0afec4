//! Warming run records.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{EventSource, EventType};

/// Result of one target inside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Warmed {
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    Failed {
        error: String,
        #[serde(rename = "timedOut")]
        timed_out: bool,
    },
    Skipped {
        reason: String,
    },
}

impl TargetOutcome {
    pub fn event_type(&self) -> EventType {
        match self {
            TargetOutcome::Warmed { .. } => EventType::Warm,
            TargetOutcome::Failed { .. } => EventType::Error,
            TargetOutcome::Skipped { .. } => EventType::Skip,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::Warmed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub warmed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One invocation of a warming strategy.
///
/// Mutable only while `finished_at` is `None`; [`WarmingRun::finish`] seals it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmingRun {
    pub id: Uuid,
    pub source: EventSource,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub requested_targets: Vec<String>,
    pub results: BTreeMap<String, TargetOutcome>,
    pub concurrency_used: usize,
    pub summary: RunSummary,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_started: Vec<String>,
}

impl WarmingRun {
    pub fn start(source: EventSource, requested_targets: Vec<String>, concurrency: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            started_at: OffsetDateTime::now_utc(),
            finished_at: None,
            requested_targets,
            results: BTreeMap::new(),
            concurrency_used: concurrency,
            summary: RunSummary::default(),
            cancelled: false,
            not_started: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Record a target outcome. Ignored once the run is finished, and the
    /// first outcome recorded for an id wins.
    pub fn record(&mut self, target_id: &str, outcome: TargetOutcome) {
        if self.is_finished() || self.results.contains_key(target_id) {
            return;
        }
        match outcome.event_type() {
            EventType::Warm => self.summary.warmed += 1,
            EventType::Error => self.summary.failed += 1,
            EventType::Skip => self.summary.skipped += 1,
        }
        self.results.insert(target_id.to_string(), outcome);
    }

    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(OffsetDateTime::now_utc());
        }
    }
}
