//! Warming targets and the refresh seam.

use std::{
    fmt,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use crate::domain::types::{Priority, TargetKind};

use super::error::RefreshError;

/// The side-effecting operation behind a target: re-fetch a page, hit a
/// revalidation endpoint, reload a data cache.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;
}

/// Adapts an async closure into a [`Refresher`].
pub struct FnRefresher<F>(F);

impl<F> FnRefresher<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Refresher for FnRefresher<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), RefreshError>> + Send,
{
    async fn refresh(&self) -> Result<(), RefreshError> {
        (self.0)().await
    }
}

/// A logical cacheable unit. Priority is fixed at registration.
#[derive(Clone)]
pub struct WarmingTarget {
    id: String,
    kind: TargetKind,
    priority: Priority,
    refresher: Arc<dyn Refresher>,
}

impl WarmingTarget {
    pub fn new(
        id: impl Into<String>,
        kind: TargetKind,
        priority: Priority,
        refresher: Arc<dyn Refresher>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            priority,
            refresher,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Run the refresh and report its wall-clock cost.
    pub async fn refresh(&self) -> Result<Duration, RefreshError> {
        let started = Instant::now();
        self.refresher.refresh().await?;
        Ok(started.elapsed())
    }
}

impl fmt::Debug for WarmingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmingTarget")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
