use axum::{extract::State, response::Response};

use super::{AdminState, error::ApiError, success};

/// `GET /cache/stats`
pub(super) async fn cache_stats(State(state): State<AdminState>) -> Result<Response, ApiError> {
    let stats = state
        .engine
        .stats
        .compute_stats()
        .await
        .map_err(|err| ApiError::event_log(&err).for_environment(state.environment))?;
    Ok(success(stats))
}
