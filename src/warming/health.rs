//! Health reporter.
//!
//! Verdict precedence, most severe first:
//! - `stale`: some critical target has no successful refresh inside the
//!   critical staleness threshold
//! - `degraded`: success rate over the most recent `health_window_events`
//!   warm/error events is below `success_rate_floor`
//! - `healthy`: otherwise
//!
//! Reporting only reads the event log and the run ledger.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{
    events::RevalidationEvent,
    types::{EventType, Priority},
};

use super::{
    config::WarmingConfig,
    error::LogStoreError,
    ledger::{RunLedger, RunRecord},
    log::{EventFilter, EventLogStore},
    registry::TargetRegistry,
    stats::Stats,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    Degraded,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    #[serde(flatten)]
    pub record: RunRecord,
    pub age_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub verdict: HealthVerdict,
    /// Success rate over every retained event.
    pub success_rate: Option<f64>,
    /// Success rate over the recent window the verdict is based on.
    pub recent_success_rate: Option<f64>,
    pub success_rate_floor: f64,
    pub last_runs: Vec<LastRun>,
    pub stale_critical_targets: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
}

/// Everything the verdict is derived from.
pub struct HealthInputs<'a> {
    /// Retained events, most recent first.
    pub events: &'a [RevalidationEvent],
    pub critical_targets: &'a [String],
    pub runs: Vec<RunRecord>,
    pub config: &'a WarmingConfig,
    pub now: OffsetDateTime,
}

impl HealthSnapshot {
    pub fn derive(inputs: HealthInputs<'_>) -> Self {
        let HealthInputs {
            events,
            critical_targets,
            runs,
            config,
            now,
        } = inputs;

        let threshold = config.staleness.for_priority(Priority::Critical);
        let stale_critical_targets: Vec<String> = critical_targets
            .iter()
            .filter(|id| {
                !events.iter().any(|event| {
                    event.event_type == EventType::Warm
                        && event.target_id == **id
                        && (now - event.timestamp) <= threshold
                })
            })
            .cloned()
            .collect();

        let window: Vec<&RevalidationEvent> = events
            .iter()
            .filter(|event| event.event_type != EventType::Skip)
            .take(config.health_window_events.get())
            .collect();
        let recent_success_rate = Stats::from_events(window).success_rate;
        let success_rate = Stats::from_events(events).success_rate;

        let verdict = if !stale_critical_targets.is_empty() {
            HealthVerdict::Stale
        } else if recent_success_rate.is_some_and(|rate| rate < config.success_rate_floor) {
            HealthVerdict::Degraded
        } else {
            HealthVerdict::Healthy
        };

        let last_runs = runs
            .into_iter()
            .map(|record| LastRun {
                age_seconds: (now - record.finished_at).whole_seconds().max(0),
                record,
            })
            .collect();

        Self {
            verdict,
            success_rate,
            recent_success_rate,
            success_rate_floor: config.success_rate_floor,
            last_runs,
            stale_critical_targets,
            checked_at: now,
        }
    }
}

pub struct HealthReporter {
    registry: Arc<TargetRegistry>,
    store: Arc<dyn EventLogStore>,
    ledger: Arc<RunLedger>,
    config: WarmingConfig,
}

impl HealthReporter {
    pub fn new(
        registry: Arc<TargetRegistry>,
        store: Arc<dyn EventLogStore>,
        ledger: Arc<RunLedger>,
        config: WarmingConfig,
    ) -> Self {
        Self {
            registry,
            store,
            ledger,
            config,
        }
    }

    pub async fn get_warming_health(&self) -> Result<HealthSnapshot, LogStoreError> {
        let events = self.store.query(&EventFilter::unbounded()).await?;
        let critical_targets: Vec<String> = self
            .registry
            .list()
            .iter()
            .filter(|target| target.priority() == Priority::Critical)
            .map(|target| target.id().to_string())
            .collect();

        Ok(HealthSnapshot::derive(HealthInputs {
            events: &events,
            critical_targets: &critical_targets,
            runs: self.ledger.snapshot(),
            config: &self.config,
            now: OffsetDateTime::now_utc(),
        }))
    }
}
