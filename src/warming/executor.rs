//! Warming executor.
//!
//! Runs one bounded-concurrency sweep over a target list:
//! 1. Orders targets by priority (stable, so registry order breaks ties)
//! 2. Starts at most `concurrency` refresh calls at a time, each under its
//!    own timeout
//! 3. Appends one event per attempted target as soon as it settles
//!
//! Per-target failures are absorbed into the run. A failed append aborts the
//! run with [`WarmingError::ExecutorFatal`].

use std::{
    collections::HashSet,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use futures::{StreamExt, future, stream};
use metrics::{Gauge, counter, gauge, histogram};
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

use crate::domain::{
    events::RevalidationEvent,
    runs::{TargetOutcome, WarmingRun},
    types::EventSource,
};

use super::{
    error::{LogStoreError, RefreshError, WarmingError},
    log::EventLogStore,
    target::WarmingTarget,
};

const METRIC_REFRESH_TOTAL: &str = "prewarm_refresh_total";
const METRIC_REFRESH_MS: &str = "prewarm_refresh_ms";
const METRIC_REFRESH_IN_FLIGHT: &str = "prewarm_refresh_in_flight";
const METRIC_RUN_MS: &str = "prewarm_run_ms";

/// External stop signal for a run. Once raised no new refresh is started;
/// in-flight calls finish or time out.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    raised: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.raised.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.raised.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelSignal::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Counts one refresh in the in-flight gauge for as long as it is alive,
/// including when the attempt future is dropped mid-call.
struct InFlight(Gauge);

impl InFlight {
    fn enter() -> Self {
        let gauge = gauge!(METRIC_REFRESH_IN_FLIGHT);
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub source: EventSource,
    pub concurrency: NonZeroUsize,
    pub timeout: Duration,
    pub cancel: Option<CancelSignal>,
}

#[derive(Clone)]
pub struct WarmingExecutor {
    store: Arc<dyn EventLogStore>,
}

impl WarmingExecutor {
    pub fn new(store: Arc<dyn EventLogStore>) -> Self {
        Self { store }
    }

    /// Execute a fresh run over `targets`.
    pub async fn execute(
        &self,
        targets: Vec<WarmingTarget>,
        options: ExecuteOptions,
    ) -> Result<WarmingRun, WarmingError> {
        let targets = order_targets(targets);
        let requested = targets.iter().map(|t| t.id().to_string()).collect();
        let run = WarmingRun::start(options.source, requested, options.concurrency.get());
        self.execute_run(run, targets, options).await
    }

    /// Continue a run a strategy already opened (for example with skip
    /// outcomes recorded for unknown ids).
    #[instrument(
        skip_all,
        fields(run_id = %run.id, source = %options.source, targets = targets.len())
    )]
    pub async fn execute_run(
        &self,
        mut run: WarmingRun,
        targets: Vec<WarmingTarget>,
        options: ExecuteOptions,
    ) -> Result<WarmingRun, WarmingError> {
        let started = Instant::now();
        let targets = order_targets(targets);
        let scheduled: Vec<String> = targets.iter().map(|t| t.id().to_string()).collect();
        let concurrency = options.concurrency.get();
        run.concurrency_used = concurrency;

        info!(
            target = "prewarm::executor",
            run_id = %run.id,
            source = %options.source,
            targets = scheduled.len(),
            concurrency,
            timeout_ms = options.timeout.as_millis() as u64,
            "warming run started"
        );

        let cancel = options.cancel.clone();
        let mut attempts = stream::iter(targets)
            .take_while(move |_| {
                future::ready(!cancel.as_ref().is_some_and(CancelSignal::is_cancelled))
            })
            .map(|target| self.attempt(target, options.timeout, options.source))
            .buffer_unordered(concurrency);

        while let Some(attempt) = attempts.next().await {
            match attempt {
                Ok((target_id, outcome)) => run.record(&target_id, outcome),
                Err(err) => {
                    warn!(
                        target = "prewarm::executor",
                        run_id = %run.id,
                        error = %err,
                        "event log append failed; abandoning run"
                    );
                    return Err(WarmingError::ExecutorFatal(err));
                }
            }
        }
        drop(attempts);

        if options.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            run.not_started = scheduled
                .into_iter()
                .filter(|id| !run.results.contains_key(id))
                .collect();
            run.cancelled = !run.not_started.is_empty();
        }
        run.finish();

        histogram!(METRIC_RUN_MS, "source" => options.source.as_str())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "prewarm::executor",
            run_id = %run.id,
            source = %options.source,
            warmed = run.summary.warmed,
            failed = run.summary.failed,
            skipped = run.summary.skipped,
            not_started = run.not_started.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "warming run finished"
        );

        Ok(run)
    }

    async fn attempt(
        &self,
        target: WarmingTarget,
        timeout: Duration,
        source: EventSource,
    ) -> Result<(String, TargetOutcome), LogStoreError> {
        let in_flight = InFlight::enter();
        // Dropping the refresh future on timeout abandons the call and frees
        // its slot; work it already spawned elsewhere is left to finish alone.
        let result = tokio::time::timeout(timeout, target.refresh()).await;
        drop(in_flight);

        let target_id = target.id().to_string();
        let (event, outcome) = match result {
            Ok(Ok(elapsed)) => {
                let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                counter!(METRIC_REFRESH_TOTAL, "outcome" => "warm").increment(1);
                histogram!(METRIC_REFRESH_MS).record(elapsed.as_secs_f64() * 1000.0);
                info!(
                    target = "prewarm::executor",
                    target_id = %target_id,
                    priority = %target.priority(),
                    duration_ms,
                    "target warmed"
                );
                (
                    RevalidationEvent::warmed(&target_id, source, duration_ms),
                    TargetOutcome::Warmed { duration_ms },
                )
            }
            Ok(Err(err)) => failure(&target_id, source, err),
            Err(_) => failure(&target_id, source, RefreshError::Timeout(timeout)),
        };

        self.store.append(event).await?;
        Ok((target_id, outcome))
    }
}

fn failure(
    target_id: &str,
    source: EventSource,
    err: RefreshError,
) -> (RevalidationEvent, TargetOutcome) {
    let timed_out = err.is_timeout();
    counter!(
        METRIC_REFRESH_TOTAL,
        "outcome" => if timed_out { "timeout" } else { "error" }
    )
    .increment(1);
    warn!(
        target = "prewarm::executor",
        target_id = %target_id,
        error = %err,
        timed_out,
        "target refresh failed"
    );
    let message = err.to_string();
    (
        RevalidationEvent::failed(target_id, source, &message),
        TargetOutcome::Failed {
            error: message,
            timed_out,
        },
    )
}

/// Most urgent first; equal priorities keep their incoming order. Repeated
/// ids are dropped so each target is refreshed at most once per run.
fn order_targets(targets: Vec<WarmingTarget>) -> Vec<WarmingTarget> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<WarmingTarget> = targets
        .into_iter()
        .filter(|target| seen.insert(target.id().to_string()))
        .collect();
    ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));
    ordered
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::domain::types::{EventType, Priority, TargetKind};
    use crate::warming::log::{EventFilter, MemoryEventLog};
    use crate::warming::target::{FnRefresher, Refresher};

    fn store() -> Arc<MemoryEventLog> {
        Arc::new(MemoryEventLog::new(
            NonZeroUsize::new(256).expect("non-zero"),
        ))
    }

    fn options(concurrency: usize) -> ExecuteOptions {
        ExecuteOptions {
            source: EventSource::Manual,
            concurrency: NonZeroUsize::new(concurrency).expect("non-zero"),
            timeout: Duration::from_secs(5),
            cancel: None,
        }
    }

    #[derive(Default)]
    struct Tracker {
        current: AtomicUsize,
        peak: AtomicUsize,
        starts: Mutex<Vec<String>>,
    }

    struct TrackedRefresh {
        id: String,
        tracker: Arc<Tracker>,
        hold: Duration,
    }

    #[async_trait]
    impl Refresher for TrackedRefresh {
        async fn refresh(&self) -> Result<(), RefreshError> {
            self.tracker
                .starts
                .lock()
                .expect("starts lock")
                .push(self.id.clone());
            let now = self.tracker.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.tracker.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            self.tracker.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn tracked(id: &str, priority: Priority, tracker: &Arc<Tracker>) -> WarmingTarget {
        WarmingTarget::new(
            id,
            TargetKind::Page,
            priority,
            Arc::new(TrackedRefresh {
                id: id.to_string(),
                tracker: tracker.clone(),
                hold: Duration::from_millis(50),
            }),
        )
    }

    fn failing(id: &str) -> WarmingTarget {
        WarmingTarget::new(
            id,
            TargetKind::ApiData,
            Priority::Normal,
            Arc::new(FnRefresher::new(|| async {
                Err::<(), _>(RefreshError::Status { status: 503 })
            })),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_one_runs_serially_in_priority_order() {
        let tracker = Arc::new(Tracker::default());
        let log = store();
        let executor = WarmingExecutor::new(log.clone());
        let targets = vec![
            tracked("/low", Priority::Low, &tracker),
            tracked("/normal-a", Priority::Normal, &tracker),
            tracked("/critical", Priority::Critical, &tracker),
            tracked("/normal-b", Priority::Normal, &tracker),
        ];

        let run = executor
            .execute(targets, options(1))
            .await
            .expect("run completes");

        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.starts.lock().expect("starts lock"),
            vec!["/critical", "/normal-a", "/normal-b", "/low"]
        );
        assert_eq!(run.summary.warmed, 4);
        assert_eq!(log.len(), 4);
        assert!(run.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_calls_never_exceed_bound() {
        let tracker = Arc::new(Tracker::default());
        let executor = WarmingExecutor::new(store());
        let targets = (0..10)
            .map(|i| tracked(&format!("/{i}"), Priority::Normal, &tracker))
            .collect();

        let run = executor
            .execute(targets, options(3))
            .await
            .expect("run completes");

        assert_eq!(tracker.peak.load(Ordering::SeqCst), 3);
        assert_eq!(run.concurrency_used, 3);
        assert_eq!(run.results.len(), 10);
    }

    #[tokio::test]
    async fn failing_target_does_not_stop_others() {
        let tracker = Arc::new(Tracker::default());
        let log = store();
        let executor = WarmingExecutor::new(log.clone());
        let targets = vec![
            failing("/api/workshops"),
            tracked("/", Priority::High, &tracker),
            tracked("/blog", Priority::Normal, &tracker),
        ];

        let run = executor
            .execute(targets, options(2))
            .await
            .expect("run completes");

        assert_eq!(run.summary.warmed, 2);
        assert_eq!(run.summary.failed, 1);
        let errors = log
            .query(&EventFilter {
                event_type: Some(EventType::Error),
                ..EventFilter::default()
            })
            .await
            .expect("query");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].target_id, "/api/workshops");
        assert!(errors[0].error.as_deref().unwrap_or("").contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_target_times_out_and_frees_its_slot() {
        let log = store();
        let executor = WarmingExecutor::new(log.clone());
        let slow = WarmingTarget::new(
            "/slow",
            TargetKind::Page,
            Priority::Critical,
            Arc::new(FnRefresher::new(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<(), RefreshError>(())
            })),
        );
        let tracker = Arc::new(Tracker::default());
        let fast = tracked("/fast", Priority::Low, &tracker);

        let run = executor
            .execute(
                vec![slow, fast],
                ExecuteOptions {
                    timeout: Duration::from_secs(2),
                    ..options(1)
                },
            )
            .await
            .expect("run completes");

        match run.results.get("/slow") {
            Some(TargetOutcome::Failed { timed_out, error }) => {
                assert!(*timed_out);
                assert!(error.contains("timed out"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(run.results.get("/fast").is_some_and(TargetOutcome::is_success));
        assert_eq!(log.len(), 2);
    }

    struct BrokenStore;

    #[async_trait]
    impl EventLogStore for BrokenStore {
        async fn append(&self, _event: RevalidationEvent) -> Result<(), LogStoreError> {
            Err(LogStoreError::unavailable("connection refused"))
        }

        async fn query(&self, _filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn store_failure_is_fatal() {
        let tracker = Arc::new(Tracker::default());
        let executor = WarmingExecutor::new(Arc::new(BrokenStore));
        let result = executor
            .execute(vec![tracked("/", Priority::Critical, &tracker)], options(1))
            .await;

        assert!(matches!(result, Err(WarmingError::ExecutorFatal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_starts_but_drains_in_flight() {
        let log = store();
        let executor = WarmingExecutor::new(log.clone());
        let signal = CancelSignal::new();
        let trigger = signal.clone();
        let first = WarmingTarget::new(
            "/first",
            TargetKind::Page,
            Priority::Critical,
            Arc::new(FnRefresher::new(move || {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<(), RefreshError>(())
                }
            })),
        );
        let tracker = Arc::new(Tracker::default());
        let targets = vec![
            first,
            tracked("/second", Priority::Normal, &tracker),
            tracked("/third", Priority::Low, &tracker),
        ];

        let run = executor
            .execute(
                targets,
                ExecuteOptions {
                    cancel: Some(signal),
                    ..options(1)
                },
            )
            .await
            .expect("run completes");

        assert!(run.cancelled);
        assert!(run.results.get("/first").is_some_and(TargetOutcome::is_success));
        assert_eq!(run.not_started, vec!["/second", "/third"]);
        assert_eq!(log.len(), 1);
        assert!(tracker.starts.lock().expect("starts lock").is_empty());
    }

    #[tokio::test]
    async fn duplicate_targets_refresh_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let target = WarmingTarget::new(
            "/",
            TargetKind::Page,
            Priority::High,
            Arc::new(FnRefresher::new(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), RefreshError>(())
                }
            })),
        );

        let run = WarmingExecutor::new(store())
            .execute(vec![target.clone(), target], options(2))
            .await
            .expect("run completes");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.requested_targets, vec!["/"]);
    }

    #[test]
    fn in_flight_gauge_settles_when_a_fatal_append_drops_pending_calls() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let started = Arc::new(AtomicUsize::new(0));

        let hanging = |id: &str| {
            let started = started.clone();
            WarmingTarget::new(
                id,
                TargetKind::Page,
                Priority::Normal,
                Arc::new(FnRefresher::new(move || {
                    let started = started.clone();
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        future::pending::<()>().await;
                        Ok::<(), RefreshError>(())
                    }
                })),
            )
        };
        let quick = WarmingTarget::new(
            "/",
            TargetKind::Page,
            Priority::Critical,
            Arc::new(FnRefresher::new(|| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<(), RefreshError>(())
            })),
        );
        let targets = vec![quick, hanging("/a"), hanging("/b")];

        let result = metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("runtime")
                .block_on(WarmingExecutor::new(Arc::new(BrokenStore)).execute(targets, options(3)))
        });

        assert!(matches!(result, Err(WarmingError::ExecutorFatal(_))));
        assert_eq!(started.load(Ordering::SeqCst), 2);
        let in_flight = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| {
                (key.key().name() == METRIC_REFRESH_IN_FLIGHT).then_some(value)
            });
        match in_flight {
            Some(DebugValue::Gauge(value)) => assert_eq!(value.0, 0.0),
            other => panic!("unexpected gauge: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_resolves_for_early_and_late_waiters() {
        let signal = CancelSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        tokio::task::yield_now().await;

        signal.cancel();
        waiter.await.expect("waiter finishes");
        // Already raised: returns immediately.
        signal.cancelled().await;
    }
}
