//! Token-gated admin surface for the warming engine.

mod auth;
mod error;
mod health;
mod logs;
mod state;
mod stats;
mod warming;

pub use error::ApiError;
pub use state::{AdminState, AdminToken};

use axum::{
    Json, Router, middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use super::middleware::{log_responses, set_request_context};

/// Successful admin response: `{success: true, data, timestamp}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

fn success<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data,
        timestamp: OffsetDateTime::now_utc(),
    })
    .into_response()
}

pub fn build_admin_router(state: AdminState) -> Router {
    let protected = Router::new()
        .route("/cache/stats", get(stats::cache_stats))
        .route("/cache/logs", get(logs::cache_logs))
        .route(
            "/cache-warming",
            get(warming::warming_health).post(warming::warming_action),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth,
        ));

    Router::new()
        .merge(protected)
        .route("/healthz", get(health::healthz))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
