use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::config::DeployEnvironment;
use crate::warming::{LogStoreError, WarmingError};

const SOURCE: &str = "infra::http::admin";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failed admin response: `{success: false, error, details?}`.
///
/// The full diagnostic chain always travels in the attached [`ErrorReport`].
#[derive(Debug)]
pub struct ApiError {
    message: &'static str,
    report: ErrorReport,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &'static str, diagnostic: impl Into<String>) -> Self {
        Self {
            message,
            report: ErrorReport::from_message(SOURCE, status, diagnostic),
            details: None,
        }
    }

    /// Keeps every `source()` of `error` for the response log.
    pub fn from_error(status: StatusCode, message: &'static str, error: &dyn StdError) -> Self {
        Self {
            message,
            report: ErrorReport::from_error(SOURCE, status, error),
            details: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "missing or invalid admin token",
        )
    }

    pub fn bad_request(message: &'static str, diagnostic: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, diagnostic)
    }

    pub fn event_log(err: &LogStoreError) -> Self {
        Self::from_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Event log unavailable",
            err,
        )
    }

    /// Copy the top-level diagnostic into `details` outside production.
    pub fn for_environment(mut self, environment: DeployEnvironment) -> Self {
        if !environment.is_production() {
            self.details = self.report.messages.first().cloned();
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.report.status
    }
}

impl From<WarmingError> for ApiError {
    fn from(err: WarmingError) -> Self {
        let (status, message) = match &err {
            WarmingError::Validation(_) | WarmingError::UnknownTarget(_) => {
                (StatusCode::BAD_REQUEST, "Invalid warming request")
            }
            WarmingError::ExecutorFatal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Warming run aborted")
            }
        };
        Self::from_error(status, message, &err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: self.message,
            details: self.details,
        };
        let mut response = (self.report.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_hidden_in_production() {
        let err = ApiError::bad_request("Invalid query", "bad `since`")
            .for_environment(DeployEnvironment::Production);
        assert!(err.details.is_none());

        let err = ApiError::bad_request("Invalid query", "bad `since`")
            .for_environment(DeployEnvironment::Development);
        assert_eq!(err.details.as_deref(), Some("bad `since`"));
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::from(WarmingError::validation("`concurrency` must be positive"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn fatal_run_reports_the_store_error_underneath() {
        let err = ApiError::from(WarmingError::ExecutorFatal(LogStoreError::unavailable(
            "disk full",
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = err.into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");
        assert_eq!(report.source, SOURCE);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "event log unavailable: disk full");
    }
}
