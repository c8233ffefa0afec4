use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use prewarm::domain::events::RevalidationEvent;
use prewarm::domain::types::{Priority, TargetKind};
use prewarm::infra::runtime::Engine;
use prewarm::warming::{
    EventFilter, EventLogStore, FallbackEventLog, FnRefresher, LogStoreError, RefreshError,
    RunOptions, TargetRegistry, WarmingConfig, WarmingTarget,
};

struct ReadOnlyStore;

#[async_trait]
impl EventLogStore for ReadOnlyStore {
    async fn append(&self, _event: RevalidationEvent) -> Result<(), LogStoreError> {
        Err(LogStoreError::unavailable("read-only filesystem"))
    }

    async fn query(&self, _filter: &EventFilter) -> Result<Vec<RevalidationEvent>, LogStoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn warming_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let registry = TargetRegistry::new(vec![
        WarmingTarget::new(
            "/",
            TargetKind::Page,
            Priority::Critical,
            Arc::new(FnRefresher::new(|| async { Ok::<(), RefreshError>(()) })),
        ),
        WarmingTarget::new(
            "/broken",
            TargetKind::ApiData,
            Priority::Normal,
            Arc::new(FnRefresher::new(|| async {
                Err::<(), RefreshError>(RefreshError::Status { status: 500 })
            })),
        ),
    ])
    .expect("registry");

    let capacity = NonZeroUsize::new(16).expect("non-zero");
    let store = Arc::new(FallbackEventLog::new(Arc::new(ReadOnlyStore), capacity));
    let engine = Engine::new(registry, store, WarmingConfig::default());

    let run = engine
        .warmer
        .warm(
            &["/".to_string(), "/broken".to_string(), "/missing".to_string()],
            RunOptions::default(),
        )
        .await
        .expect("fallback keeps the run alive");
    assert_eq!(run.summary.warmed, 1);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(run.summary.skipped, 1);

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "prewarm_refresh_total",
        "prewarm_refresh_ms",
        "prewarm_refresh_in_flight",
        "prewarm_run_ms",
        "prewarm_event_skipped_total",
        "prewarm_event_log_fallback_total",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let fallback_writes = snapshot
        .iter()
        .find_map(|(composite_key, _, _, value)| {
            (composite_key.key().name() == "prewarm_event_log_fallback_total").then_some(value)
        });
    assert!(matches!(fallback_writes, Some(DebugValue::Counter(3))));
}
