use std::time::Duration;

use thiserror::Error;

/// A single target's refresh failed. Always absorbed by the executor.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("upstream responded with status {status}")]
    Status { status: u16 },
    #[error("refresh timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

impl RefreshError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RefreshError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("event log unavailable: {0}")]
    Unavailable(String),
    #[error("event log io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event log encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl LogStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

#[derive(Debug, Error)]
pub enum WarmingError {
    #[error("unknown target `{0}`")]
    UnknownTarget(String),
    #[error("invalid warming request: {0}")]
    Validation(String),
    #[error("warming run aborted: {0}")]
    ExecutorFatal(#[source] LogStoreError),
}

impl WarmingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
