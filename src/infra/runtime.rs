//! Engine wiring shared by the server, the one-shot CLI and tests.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{EventLogSettings, LogBackend, Settings};
use crate::domain::types::EventSource;
use crate::warming::{
    CancelSignal, EventLogStore, FallbackEventLog, HealthReporter, JsonlEventLog, MemoryEventLog,
    RunLedger, RunOptions, StatsAggregator, TargetRegistry, Warmer, WarmingConfig,
};

use super::{error::InfraError, refresh};

/// Every long-lived warming component, wired to one store and registry.
#[derive(Clone)]
pub struct Engine {
    pub registry: Arc<TargetRegistry>,
    pub store: Arc<dyn EventLogStore>,
    pub ledger: Arc<RunLedger>,
    pub warmer: Arc<Warmer>,
    pub stats: Arc<StatsAggregator>,
    pub health: Arc<HealthReporter>,
}

impl Engine {
    pub fn new(
        registry: TargetRegistry,
        store: Arc<dyn EventLogStore>,
        config: WarmingConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let ledger = Arc::new(RunLedger::new());
        let warmer = Arc::new(Warmer::new(
            registry.clone(),
            store.clone(),
            ledger.clone(),
            config.clone(),
        ));
        let stats = Arc::new(StatsAggregator::new(store.clone()));
        let health = Arc::new(HealthReporter::new(
            registry.clone(),
            store.clone(),
            ledger.clone(),
            config,
        ));
        Self {
            registry,
            store,
            ledger,
            warmer,
            stats,
            health,
        }
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let client = refresh::build_client()?;
        let registry = refresh::build_registry(&settings.targets, &client)?;
        let store = open_event_log(&settings.log).await?;
        info!(
            target = "prewarm::runtime",
            targets = registry.len(),
            "warming engine ready"
        );
        Ok(Self::new(
            registry,
            store,
            WarmingConfig::from(&settings.warming),
        ))
    }
}

pub async fn open_event_log(
    settings: &EventLogSettings,
) -> Result<Arc<dyn EventLogStore>, InfraError> {
    let primary: Arc<dyn EventLogStore> = match &settings.backend {
        LogBackend::Memory => Arc::new(MemoryEventLog::new(settings.capacity)),
        LogBackend::Jsonl { path } => Arc::new(JsonlEventLog::open(path, settings.capacity).await?),
    };
    // Only fallible backends get the fallback wrapper.
    if settings.fallback && settings.backend != LogBackend::Memory {
        return Ok(Arc::new(FallbackEventLog::new(primary, settings.capacity)));
    }
    Ok(primary)
}

/// Background loop running the smart selection with source `scheduled`.
pub struct Scheduler {
    handle: JoinHandle<()>,
    cancel: CancelSignal,
}

impl Scheduler {
    /// Start ticking. The first run happens one `cadence` after start-up.
    pub fn spawn(warmer: Arc<Warmer>, cadence: Duration) -> Self {
        let cancel = CancelSignal::new();
        let signal = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = signal.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let options = RunOptions::default().with_cancel(signal.clone());
                match warmer
                    .smart_with_source(EventSource::Scheduled, options)
                    .await
                {
                    Ok(run) if run.cancelled => {
                        warn!(
                            target = "prewarm::scheduler",
                            run_id = %run.id,
                            not_started = run.not_started.len(),
                            "scheduled run cancelled"
                        );
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => error!(
                        target = "prewarm::scheduler",
                        error = %err,
                        "scheduled warming run failed"
                    ),
                }
                // The next run is due one full cadence after this one ended.
                interval.reset();
            }
        });
        info!(
            target = "prewarm::scheduler",
            cadence_secs = cadence.as_secs(),
            "scheduled warming enabled"
        );
        Self { handle, cancel }
    }

    /// Stop scheduling new refreshes and give an in-progress run `grace` to
    /// drain before aborting the loop. An idle loop exits immediately.
    pub async fn shutdown(self, grace: Duration) {
        let Self { mut handle, cancel } = self;
        cancel.cancel();
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            handle.abort();
            let _ = handle.await;
        }
    }
}
