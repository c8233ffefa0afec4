use std::{collections::HashMap, num::NonZeroUsize};

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::domain::{
    events::RevalidationEvent,
    types::{EventSource, EventType},
};
use crate::warming::EventFilter;

use super::{AdminState, error::ApiError, success};

#[derive(Debug, Serialize)]
struct LogsPayload {
    logs: Vec<RevalidationEvent>,
    filters: EventFilter,
    total: usize,
}

/// `GET /cache/logs?type=&source=&target=&since=&limit=`
///
/// Unknown keys are ignored. A missing or unparsable `limit` falls back to
/// the default page size; malformed `type`, `source` or `since` are rejected.
pub(super) async fn cache_logs(
    State(state): State<AdminState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let filter = parse_filter(&params).map_err(|err| err.for_environment(state.environment))?;
    let logs = state
        .engine
        .store
        .query(&filter)
        .await
        .map_err(|err| ApiError::event_log(&err).for_environment(state.environment))?;

    let total = logs.len();
    Ok(success(LogsPayload {
        logs,
        filters: filter,
        total,
    }))
}

fn parse_filter(params: &HashMap<String, String>) -> Result<EventFilter, ApiError> {
    let value = |key: &str| {
        params
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let event_type = value("type")
        .map(str::parse::<EventType>)
        .transpose()
        .map_err(|err| ApiError::bad_request("Invalid log filter", err.to_string()))?;
    let source = value("source")
        .map(str::parse::<EventSource>)
        .transpose()
        .map_err(|err| ApiError::bad_request("Invalid log filter", err.to_string()))?;
    let since = value("since")
        .map(|raw| OffsetDateTime::parse(raw, &Rfc3339))
        .transpose()
        .map_err(|err| {
            ApiError::bad_request("Invalid log filter", format!("`since` must be RFC 3339: {err}"))
        })?;
    let limit = value("limit")
        .and_then(|raw| raw.parse::<NonZeroUsize>().ok())
        .or_else(|| EventFilter::default().limit);

    Ok(EventFilter {
        event_type,
        source,
        target_id: value("target").map(str::to_string),
        since,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn invalid_limit_falls_back_to_default() {
        for raw in ["abc", "0", "-3", ""] {
            let filter = parse_filter(&params(&[("limit", raw)])).expect("filter");
            assert_eq!(filter.cap(), 50, "limit `{raw}`");
        }
        let filter = parse_filter(&params(&[("limit", "7")])).expect("filter");
        assert_eq!(filter.cap(), 7);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let filter = parse_filter(&params(&[("color", "blue"), ("type", "error")])).expect("filter");
        assert_eq!(filter.event_type, Some(EventType::Error));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(parse_filter(&params(&[("type", "exploded")])).is_err());
        assert!(parse_filter(&params(&[("source", "cron")])).is_err());
        assert!(parse_filter(&params(&[("since", "yesterday")])).is_err());
    }

    #[test]
    fn since_and_target_are_parsed() {
        let filter = parse_filter(&params(&[
            ("since", "2026-01-02T03:04:05Z"),
            ("target", "/blog"),
        ]))
        .expect("filter");
        assert_eq!(filter.target_id.as_deref(), Some("/blog"));
        assert_eq!(
            filter.since.map(OffsetDateTime::unix_timestamp),
            Some(1_767_323_045)
        );
    }
}
