//! Cache warming engine.
//!
//! Proactively refreshes registered targets before user traffic reaches a
//! cold cache, and records every attempt:
//!
//! - **Registry**: static set of [`WarmingTarget`]s loaded at start-up
//! - **Executor**: bounded-concurrency sweep with per-call timeouts
//! - **Strategies**: `warm`, `critical`, `smart` and `deployment` entry points
//! - **Event log**: append-only [`RevalidationEvent`] store behind a trait
//! - **Stats / health**: read-only views over the log and the run ledger
//!
//! ## Configuration
//!
//! Tuning lives under `[warming]` in `prewarm.toml`:
//!
//! ```toml
//! [warming]
//! default_concurrency = 3
//! timeout_ms = 30000
//! stale_critical_seconds = 300
//! success_rate_floor = 90.0
//! # ... see config.rs for all options
//! ```
//!
//! [`RevalidationEvent`]: crate::domain::events::RevalidationEvent

pub mod config;
mod error;
mod executor;
mod health;
mod ledger;
mod lock;
pub mod log;
mod registry;
mod stats;
mod strategies;
mod target;

pub use config::{StalenessThresholds, WarmingConfig};
pub use error::{LogStoreError, RefreshError, WarmingError};
pub use executor::{CancelSignal, ExecuteOptions, WarmingExecutor};
pub use health::{HealthInputs, HealthReporter, HealthSnapshot, HealthVerdict, LastRun};
pub use ledger::{RunLedger, RunRecord};
pub use log::{
    EventFilter, EventLogStore, FallbackEventLog, JsonlEventLog, MemoryEventLog,
};
pub use registry::{RegistryError, TargetRegistry};
pub use stats::{SourceCounts, Stats, StatsAggregator, TypeCounts};
pub use strategies::{RunOptions, Warmer};
pub use target::{FnRefresher, Refresher, WarmingTarget};
