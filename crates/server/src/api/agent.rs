//! Agent run API handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use harrier_core::{ArtifactRef, TaskRequest};

use crate::metrics;
use crate::state::AppState;

const DEFAULT_MAX_STEPS: u32 = 50;
const DEFAULT_MODEL: &str = "gpt-5.1";

/// Hard cap on the step budget a caller can request.
const MAX_STEPS_LIMIT: u32 = 200;

/// Request body for running an agent task
#[derive(Debug, Deserialize)]
pub struct RunAgentBody {
    /// Natural-language task description
    pub prompt: String,
    /// Step budget per attempt (default: 50)
    pub max_steps: Option<u32>,
    /// Model identifier forwarded to the engine (default: "gpt-5.1")
    pub model: Option<String>,
}

/// Response for an agent run.
///
/// Always structurally valid: when every round fails, the fields are
/// empty rather than the request erroring.
#[derive(Debug, Serialize)]
pub struct RunAgentResponse {
    pub extracted_data: Option<serde_json::Value>,
    pub steps_taken: u32,
    pub video_url: Option<String>,
}

pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunAgentBody>,
) -> Result<Json<RunAgentResponse>, (StatusCode, String)> {
    if body.prompt.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "prompt cannot be empty".to_string()));
    }

    let max_steps = body.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
    if max_steps == 0 || max_steps > MAX_STEPS_LIMIT {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("max_steps must be between 1 and {}", MAX_STEPS_LIMIT),
        ));
    }

    let task = TaskRequest {
        prompt: body.prompt,
        max_steps,
        model: body.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    };

    info!(
        max_steps = task.max_steps,
        model = task.model.as_str(),
        "Agent run requested"
    );

    let result = state.scheduler().run(task).await;

    let label = if result.is_empty() { "empty" } else { "completed" };
    metrics::AGENT_REQUESTS.with_label_values(&[label]).inc();

    Ok(Json(RunAgentResponse {
        extracted_data: result.payload,
        steps_taken: result.steps_taken,
        video_url: result.artifact.as_ref().map(ArtifactRef::locator),
    }))
}
