//! Shared domain enumerations for targets, events and runs.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Static urgency class of a warming target.
///
/// Ordering is total: `Critical > High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    fn urgency(self) -> u8 {
        match self {
            Priority::Critical => 3,
            Priority::High => 2,
            Priority::Normal => 1,
            Priority::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.urgency().cmp(&other.urgency())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value)
            .ok_or_else(|| DomainError::validation(format!("unknown priority `{value}`")))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Page,
    ApiData,
    Other,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Page => "page",
            TargetKind::ApiData => "api-data",
            TargetKind::Other => "other",
        }
    }
}

impl FromStr for TargetKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "page" => Ok(TargetKind::Page),
            "api-data" | "api_data" => Ok(TargetKind::ApiData),
            "other" => Ok(TargetKind::Other),
            other => Err(DomainError::validation(format!(
                "unknown target kind `{other}`"
            ))),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome class recorded for a single target in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Warm,
    Error,
    Skip,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Warm => "warm",
            EventType::Error => "error",
            EventType::Skip => "skip",
        }
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "warm" => Ok(EventType::Warm),
            "error" => Ok(EventType::Error),
            "skip" => Ok(EventType::Skip),
            other => Err(DomainError::validation(format!(
                "unknown event type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which strategy or caller triggered a run (and therefore its events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Manual,
    Critical,
    Smart,
    Deployment,
    Scheduled,
}

impl EventSource {
    pub const ALL: [EventSource; 5] = [
        EventSource::Manual,
        EventSource::Critical,
        EventSource::Smart,
        EventSource::Deployment,
        EventSource::Scheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::Manual => "manual",
            EventSource::Critical => "critical",
            EventSource::Smart => "smart",
            EventSource::Deployment => "deployment",
            EventSource::Scheduled => "scheduled",
        }
    }
}

impl FromStr for EventSource {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventSource::ALL
            .into_iter()
            .find(|source| source.as_str() == value)
            .ok_or_else(|| DomainError::validation(format!("unknown event source `{value}`")))
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
