//! Warming engine tuning.
//!
//! Concurrency bounds, per-call timeout, staleness thresholds and health
//! cutoffs. Every value is overridable from `prewarm.toml` via `[warming]`.

use std::{num::NonZeroUsize, time::Duration};

use crate::domain::types::{EventSource, Priority};

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;
pub const DEFAULT_CRITICAL_CONCURRENCY: usize = 2;
pub const DEFAULT_SMART_CONCURRENCY: usize = 4;
pub const DEFAULT_DEPLOYMENT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STALE_CRITICAL_SECS: u64 = 5 * 60;
pub const DEFAULT_STALE_HIGH_SECS: u64 = 30 * 60;
pub const DEFAULT_STALE_NORMAL_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_STALE_LOW_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_SUCCESS_RATE_FLOOR: f64 = 90.0;
pub const DEFAULT_HEALTH_WINDOW_EVENTS: usize = 50;

/// Maximum tolerable age of a target's last successful refresh, per priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessThresholds {
    pub critical: Duration,
    pub high: Duration,
    pub normal: Duration,
    pub low: Duration,
}

impl StalenessThresholds {
    pub fn for_priority(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

impl Default for StalenessThresholds {
    fn default() -> Self {
        Self {
            critical: Duration::from_secs(DEFAULT_STALE_CRITICAL_SECS),
            high: Duration::from_secs(DEFAULT_STALE_HIGH_SECS),
            normal: Duration::from_secs(DEFAULT_STALE_NORMAL_SECS),
            low: Duration::from_secs(DEFAULT_STALE_LOW_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WarmingConfig {
    /// Concurrency for explicit `warm` calls without an override.
    pub default_concurrency: NonZeroUsize,
    /// Upper clamp applied to any caller-supplied concurrency.
    pub max_concurrency: NonZeroUsize,
    pub critical_concurrency: NonZeroUsize,
    pub smart_concurrency: NonZeroUsize,
    pub deployment_concurrency: NonZeroUsize,
    /// Per-call refresh timeout.
    pub timeout: Duration,
    pub staleness: StalenessThresholds,
    /// Success-rate percentage under which health reports `degraded`.
    pub success_rate_floor: f64,
    /// Number of most recent warm/error events the health verdict looks at.
    pub health_window_events: NonZeroUsize,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            default_concurrency: non_zero(DEFAULT_CONCURRENCY),
            max_concurrency: non_zero(DEFAULT_MAX_CONCURRENCY),
            critical_concurrency: non_zero(DEFAULT_CRITICAL_CONCURRENCY),
            smart_concurrency: non_zero(DEFAULT_SMART_CONCURRENCY),
            deployment_concurrency: non_zero(DEFAULT_DEPLOYMENT_CONCURRENCY),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            staleness: StalenessThresholds::default(),
            success_rate_floor: DEFAULT_SUCCESS_RATE_FLOOR,
            health_window_events: non_zero(DEFAULT_HEALTH_WINDOW_EVENTS),
        }
    }
}

impl From<&crate::config::WarmingSettings> for WarmingConfig {
    fn from(settings: &crate::config::WarmingSettings) -> Self {
        Self {
            default_concurrency: settings.default_concurrency,
            max_concurrency: settings.max_concurrency,
            critical_concurrency: settings.critical_concurrency,
            smart_concurrency: settings.smart_concurrency,
            deployment_concurrency: settings.deployment_concurrency,
            timeout: settings.timeout,
            staleness: settings.staleness,
            success_rate_floor: settings.success_rate_floor,
            health_window_events: settings.health_window_events,
        }
    }
}

impl WarmingConfig {
    /// Strategy default concurrency for a source, before caller overrides.
    pub fn concurrency_for(&self, source: EventSource) -> NonZeroUsize {
        let value = match source {
            EventSource::Manual => self.default_concurrency,
            EventSource::Critical => self.critical_concurrency,
            EventSource::Smart | EventSource::Scheduled => self.smart_concurrency,
            EventSource::Deployment => self.deployment_concurrency,
        };
        self.clamp(value)
    }

    pub fn clamp(&self, requested: NonZeroUsize) -> NonZeroUsize {
        requested.min(self.max_concurrency)
    }
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}
