//! Step-wise HTTP automation driver client.
//!
//! The remote driver exposes a session API: create a session bound to a
//! proxy, drive it one step at a time, fetch the final history, delete
//! the session. Driving steps individually is what makes the per-step
//! observer a real cancellation checkpoint: the worker regains control
//! between every pair of steps.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;

use super::{
    AutomationEngine, EngineError, PreparedTask, RunHistory, StepDirective, StepObserver,
    StepRecord,
};

/// Client for a remote step-wise automation driver.
pub struct RemoteEngine {
    client: Client,
    config: EngineConfig,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    step: StepRecord,
    #[serde(default)]
    model_output: Option<serde_json::Value>,
    #[serde(default)]
    finished: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    final_page_text: Option<String>,
}

impl RemoteEngine {
    /// Create a new client with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn map_error(e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout
        } else if e.is_connect() {
            EngineError::ConnectionFailed(e.to_string())
        } else {
            EngineError::ApiError(e.to_string())
        }
    }

    async fn create_session(
        &self,
        task: &PreparedTask,
        budget: u32,
    ) -> Result<String, EngineError> {
        let body = json!({
            "task": task.prompt,
            "model": task.model,
            "max_steps": budget,
            "client_ref": task.session_id,
            "proxy": {
                "server": task.egress.server_url(),
                "username": task.egress.username,
                "password": task.egress.password,
            },
        });

        let response = self
            .client
            .post(format!("{}/v1/sessions", self.base_url()))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::SessionRejected(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let created: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(created.session_id)
    }

    async fn drive_step(
        &self,
        session_id: &str,
        directive: &StepDirective,
    ) -> Result<StepResponse, EngineError> {
        let body = match directive {
            StepDirective::Continue => json!({}),
            StepDirective::InjectCaptchaToken(token) => json!({
                "inject_token": { "kind": token.kind, "token": token.token },
            }),
        };

        let response = self
            .client
            .post(format!("{}/v1/sessions/{}/step", self.base_url(), session_id))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::ApiError(format!("Failed to parse response: {}", e)))
    }

    async fn fetch_final_page_text(&self, session_id: &str) -> Option<String> {
        let result = self
            .client
            .get(format!(
                "{}/v1/sessions/{}/history",
                self.base_url(),
                session_id
            ))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => response
                .json::<HistoryResponse>()
                .await
                .ok()
                .and_then(|h| h.final_page_text),
            Ok(response) => {
                debug!(
                    session_id,
                    status = response.status().as_u16(),
                    "History fetch failed"
                );
                None
            }
            Err(e) => {
                debug!(session_id, "History fetch failed: {}", e);
                None
            }
        }
    }

    /// Delete the driver session. Best-effort; the driver reaps
    /// abandoned sessions on its own timer anyway.
    async fn delete_session(&self, session_id: &str) {
        let result = self
            .client
            .delete(format!("{}/v1/sessions/{}", self.base_url(), session_id))
            .send()
            .await;

        if let Err(e) = result {
            warn!(session_id, "Failed to delete driver session: {}", e);
        }
    }
}

#[async_trait]
impl AutomationEngine for RemoteEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn run(
        &self,
        task: &PreparedTask,
        budget: u32,
        observer: &dyn StepObserver,
    ) -> Result<RunHistory, EngineError> {
        let session_id = self.create_session(task, budget).await?;
        debug!(
            session_id = session_id.as_str(),
            egress = task.egress.label(),
            "Driver session created"
        );

        let mut history = RunHistory::default();
        let mut directive = StepDirective::Continue;

        for _ in 0..budget {
            let response = match self.drive_step(&session_id, &directive).await {
                Ok(response) => response,
                Err(e) => {
                    self.delete_session(&session_id).await;
                    return Err(e);
                }
            };

            let finished = response.finished || response.step.is_done;

            if let Some(output) = response.model_output {
                history.model_outputs.push(output);
            }

            match observer.on_step(&response.step).await {
                Ok(next) => directive = next,
                Err(_) => {
                    history.steps.push(response.step);
                    self.delete_session(&session_id).await;
                    return Err(EngineError::Interrupted);
                }
            }

            history.steps.push(response.step);

            if finished {
                break;
            }
        }

        history.final_page_text = self.fetch_final_page_text(&session_id).await;
        self.delete_session(&session_id).await;

        Ok(history)
    }
}
