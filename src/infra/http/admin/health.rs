use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Liveness only; warming health stays behind the admin token.
pub(super) async fn healthz() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
