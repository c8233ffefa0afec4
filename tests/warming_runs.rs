use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use prewarm::config::{EventLogSettings, LogBackend};
use prewarm::domain::types::{EventSource, EventType, Priority, TargetKind};
use prewarm::infra::runtime::{Engine, open_event_log};
use prewarm::warming::{
    EventFilter, FnRefresher, RefreshError, RunOptions, TargetRegistry, WarmingConfig,
    WarmingTarget,
};

fn counting_target(id: &str, priority: Priority, calls: Arc<AtomicUsize>) -> WarmingTarget {
    WarmingTarget::new(
        id,
        TargetKind::Page,
        priority,
        Arc::new(FnRefresher::new(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), RefreshError>(())
            }
        })),
    )
}

fn registry(calls: &Arc<AtomicUsize>) -> TargetRegistry {
    TargetRegistry::new(vec![
        counting_target("/", Priority::Critical, calls.clone()),
        counting_target("/blog", Priority::High, calls.clone()),
        counting_target("/about", Priority::Low, calls.clone()),
    ])
    .expect("registry")
}

fn jsonl_settings(path: std::path::PathBuf) -> EventLogSettings {
    EventLogSettings {
        backend: LogBackend::Jsonl { path },
        capacity: NonZeroUsize::new(100).expect("non-zero"),
        fallback: true,
    }
}

#[tokio::test]
async fn deployment_warms_everything_then_smart_finds_nothing_due() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_event_log(&jsonl_settings(dir.path().join("events.jsonl")))
        .await
        .expect("store");
    let engine = Engine::new(registry(&calls), store, WarmingConfig::default());

    let run = engine
        .warmer
        .deployment(RunOptions::default())
        .await
        .expect("deployment run");
    assert_eq!(run.source, EventSource::Deployment);
    assert_eq!(run.summary.warmed, 3);
    assert_eq!(run.requested_targets, vec!["/", "/blog", "/about"]);
    assert!(run.finished_at.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let smart = engine
        .warmer
        .smart(RunOptions::default())
        .await
        .expect("smart run");
    assert!(smart.results.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn jsonl_log_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("log").join("events.jsonl");

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let store = open_event_log(&jsonl_settings(path.clone()))
            .await
            .expect("store");
        let engine = Engine::new(registry(&calls), store, WarmingConfig::default());
        engine
            .warmer
            .critical(RunOptions::default())
            .await
            .expect("critical run");
    }

    let store = open_event_log(&jsonl_settings(path)).await.expect("reopen");
    let events = store
        .query(&EventFilter::unbounded())
        .await
        .expect("query");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target_id, "/");
    assert_eq!(events[0].event_type, EventType::Warm);
    assert_eq!(events[0].source, EventSource::Critical);

    // A restarted engine sees "/" as fresh and only warms the rest.
    let engine = Engine::new(registry(&calls), store, WarmingConfig::default());
    let smart = engine
        .warmer
        .smart(RunOptions::default())
        .await
        .expect("smart run");
    let warmed: Vec<&str> = smart.results.keys().map(String::as_str).collect();
    assert_eq!(warmed, vec!["/about", "/blog"]);

    let stats = engine.stats.compute_stats().await.expect("stats");
    assert_eq!(stats.total_events, 3);
    assert_eq!(stats.by_source.critical, 1);
    assert_eq!(stats.by_source.smart, 2);
    assert_eq!(stats.success_rate, Some(100.0));
}
