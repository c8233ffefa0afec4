//! Warming strategies.
//!
//! Each strategy picks a target set and run options, then hands off to the
//! [`WarmingExecutor`]:
//!
//! | Strategy     | Targets                             | Source       |
//! |--------------|-------------------------------------|--------------|
//! | `warm`       | caller-supplied ids                 | `manual`     |
//! | `critical`   | `priority = critical`               | `critical`   |
//! | `smart`      | last success older than threshold   | `smart`      |
//! | `deployment` | the whole registry                  | `deployment` |
//!
//! Finished runs are recorded in the [`RunLedger`].

use std::{
    collections::HashSet,
    num::NonZeroUsize,
    sync::Arc,
    time::Duration,
};

use metrics::counter;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::domain::{
    events::RevalidationEvent,
    runs::{TargetOutcome, WarmingRun},
    types::{EventSource, Priority},
};

use super::{
    config::WarmingConfig,
    error::WarmingError,
    executor::{CancelSignal, ExecuteOptions, WarmingExecutor},
    ledger::RunLedger,
    log::EventLogStore,
    registry::TargetRegistry,
    target::WarmingTarget,
};

const METRIC_EVENT_SKIPPED_TOTAL: &str = "prewarm_event_skipped_total";
const UNKNOWN_TARGET_REASON: &str = "unknown target";

/// Caller overrides for a single run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Clamped to `max_concurrency`; zero is rejected.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Per-call timeout override; zero is rejected.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(skip)]
    pub cancel: Option<CancelSignal>,
}

impl RunOptions {
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

pub struct Warmer {
    registry: Arc<TargetRegistry>,
    store: Arc<dyn EventLogStore>,
    executor: WarmingExecutor,
    ledger: Arc<RunLedger>,
    config: WarmingConfig,
}

impl Warmer {
    pub fn new(
        registry: Arc<TargetRegistry>,
        store: Arc<dyn EventLogStore>,
        ledger: Arc<RunLedger>,
        config: WarmingConfig,
    ) -> Self {
        Self {
            executor: WarmingExecutor::new(store.clone()),
            registry,
            store,
            ledger,
            config,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WarmingConfig {
        &self.config
    }

    /// Warm an explicit list of target ids.
    ///
    /// Repeated ids collapse to their first occurrence. Ids missing from the
    /// registry are recorded as `skip` events and `Skipped` outcomes.
    pub async fn warm(&self, ids: &[String], options: RunOptions) -> Result<WarmingRun, WarmingError> {
        let mut seen = HashSet::new();
        let requested: Vec<String> = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Err(WarmingError::validation(
                "`targets` must name at least one target id",
            ));
        }

        let source = EventSource::Manual;
        let execute = self.execute_options(source, &options)?;
        let mut run = WarmingRun::start(source, requested.clone(), execute.concurrency.get());

        let mut known = Vec::with_capacity(requested.len());
        for id in &requested {
            match self.registry.get(id) {
                Ok(target) => known.push(target.clone()),
                Err(WarmingError::UnknownTarget(_)) => {
                    self.record_unknown(id, source).await?;
                    run.record(
                        id,
                        TargetOutcome::Skipped {
                            reason: UNKNOWN_TARGET_REASON.to_string(),
                        },
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let run = self.executor.execute_run(run, known, execute).await?;
        Ok(self.finish(run))
    }

    /// Warm every critical target.
    pub async fn critical(&self, options: RunOptions) -> Result<WarmingRun, WarmingError> {
        let targets = self
            .registry
            .filter_by_priority(&HashSet::from([Priority::Critical]));
        self.run(EventSource::Critical, targets, options).await
    }

    /// Warm targets whose last successful refresh is older than their
    /// priority's staleness threshold. Targets never warmed are always due.
    pub async fn smart(&self, options: RunOptions) -> Result<WarmingRun, WarmingError> {
        self.smart_with_source(EventSource::Smart, options).await
    }

    /// [`Warmer::smart`] tagged with a different source (the scheduler uses
    /// `scheduled`).
    pub async fn smart_with_source(
        &self,
        source: EventSource,
        options: RunOptions,
    ) -> Result<WarmingRun, WarmingError> {
        let targets = self.stale_targets(OffsetDateTime::now_utc()).await?;
        self.run(source, targets, options).await
    }

    /// Warm the whole registry.
    pub async fn deployment(&self, options: RunOptions) -> Result<WarmingRun, WarmingError> {
        let targets = self.registry.list().to_vec();
        self.run(EventSource::Deployment, targets, options).await
    }

    /// Targets due for a smart refresh at `now`, in registry order.
    pub async fn stale_targets(&self, now: OffsetDateTime) -> Result<Vec<WarmingTarget>, WarmingError> {
        let mut due = Vec::new();
        for target in self.registry.list() {
            let last = self
                .store
                .last_success(target.id())
                .await
                .map_err(WarmingError::ExecutorFatal)?;
            let threshold = self.config.staleness.for_priority(target.priority());
            if is_stale(last.as_ref().map(|event| event.timestamp), threshold, now) {
                due.push(target.clone());
            }
        }
        debug!(
            target = "prewarm::strategies",
            due = due.len(),
            registered = self.registry.len(),
            "smart selection computed"
        );
        Ok(due)
    }

    async fn run(
        &self,
        source: EventSource,
        targets: Vec<WarmingTarget>,
        options: RunOptions,
    ) -> Result<WarmingRun, WarmingError> {
        let execute = self.execute_options(source, &options)?;
        let run = self.executor.execute(targets, execute).await?;
        Ok(self.finish(run))
    }

    fn finish(&self, run: WarmingRun) -> WarmingRun {
        self.ledger.record(&run);
        info!(
            target = "prewarm::strategies",
            run_id = %run.id,
            source = %run.source,
            requested = run.requested_targets.len(),
            warmed = run.summary.warmed,
            failed = run.summary.failed,
            skipped = run.summary.skipped,
            "strategy completed"
        );
        run
    }

    async fn record_unknown(&self, id: &str, source: EventSource) -> Result<(), WarmingError> {
        debug!(
            target = "prewarm::strategies",
            target_id = %id,
            "skipping unknown target"
        );
        counter!(METRIC_EVENT_SKIPPED_TOTAL).increment(1);
        self.store
            .append(RevalidationEvent::skipped(id, source))
            .await
            .map_err(WarmingError::ExecutorFatal)
    }

    fn execute_options(
        &self,
        source: EventSource,
        options: &RunOptions,
    ) -> Result<ExecuteOptions, WarmingError> {
        let concurrency = match options.concurrency {
            None => self.config.concurrency_for(source),
            Some(value) => NonZeroUsize::new(value)
                .map(|value| self.config.clamp(value))
                .ok_or_else(|| WarmingError::validation("`concurrency` must be positive"))?,
        };
        let timeout = match options.timeout_ms {
            None => self.config.timeout,
            Some(0) => return Err(WarmingError::validation("`timeoutMs` must be positive")),
            Some(ms) => Duration::from_millis(ms),
        };
        Ok(ExecuteOptions {
            source,
            concurrency,
            timeout,
            cancel: options.cancel.clone(),
        })
    }
}

fn is_stale(last_success: Option<OffsetDateTime>, threshold: Duration, now: OffsetDateTime) -> bool {
    match last_success {
        None => true,
        Some(at) => (now - at) > threshold,
    }
}
