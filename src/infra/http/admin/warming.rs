use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::runs::WarmingRun;
use crate::warming::{HealthSnapshot, RunOptions};

use super::{AdminState, error::ApiError, success};

#[derive(Debug, Deserialize)]
pub(super) struct WarmingRequest {
    action: String,
    #[serde(default)]
    targets: Option<Vec<String>>,
    #[serde(default)]
    options: Option<RunOptions>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ActionResult {
    Run(WarmingRun),
    Health(HealthSnapshot),
}

/// `GET /cache-warming`: same as `action: "health"`.
pub(super) async fn warming_health(State(state): State<AdminState>) -> Result<Response, ApiError> {
    let snapshot = health(&state).await?;
    Ok(success(snapshot))
}

/// `POST /cache-warming` with `{action, targets?, options?}`.
pub(super) async fn warming_action(
    State(state): State<AdminState>,
    body: Result<Json<WarmingRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let environment = state.environment;
    let Json(request) = body.map_err(|rejection| {
        ApiError::bad_request("Invalid request body", rejection.body_text())
            .for_environment(environment)
    })?;

    let options = request.options.unwrap_or_default();
    let warmer = &state.engine.warmer;
    info!(
        target = "prewarm::http::admin",
        action = %request.action,
        "warming action requested"
    );

    let result = match request.action.as_str() {
        "warm" => {
            let targets = request.targets.unwrap_or_default();
            warmer.warm(&targets, options).await.map(ActionResult::Run)
        }
        "critical" => warmer.critical(options).await.map(ActionResult::Run),
        "smart" => warmer.smart(options).await.map(ActionResult::Run),
        "deployment" => warmer.deployment(options).await.map(ActionResult::Run),
        "health" => return Ok(success(ActionResult::Health(health(&state).await?))),
        other => {
            return Err(ApiError::bad_request(
                "Unknown action",
                format!("unknown action `{other}`"),
            )
            .for_environment(environment));
        }
    };

    let result = result.map_err(|err| ApiError::from(err).for_environment(environment))?;
    Ok(success(result))
}

async fn health(state: &AdminState) -> Result<HealthSnapshot, ApiError> {
    state
        .engine
        .health
        .get_warming_health()
        .await
        .map_err(|err| ApiError::event_log(&err).for_environment(state.environment))
}
