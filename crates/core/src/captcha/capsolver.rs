//! CapSolver solving service client (create-then-poll).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CaptchaConfig;
use crate::egress::EgressDescriptor;

use super::{CaptchaError, CaptchaSolver, CaptchaToken, Challenge};

/// CapSolver API client.
pub struct CapSolverClient {
    client: Client,
    config: CaptchaConfig,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(rename = "errorId", default)]
    error_id: i64,
    #[serde(rename = "errorDescription", default)]
    error_description: Option<String>,
    #[serde(rename = "taskId", default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResultResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    solution: Option<serde_json::Value>,
}

impl CapSolverClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CaptchaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Build the task payload, binding the solve to an egress identity
    /// when one is supplied (the task type loses its "ProxyLess" suffix).
    fn build_task(
        &self,
        challenge: &Challenge,
        egress: Option<&EgressDescriptor>,
    ) -> serde_json::Value {
        let mut task = json!({
            "type": challenge.kind.task_type(),
            "websiteURL": challenge.page_url,
            "websiteKey": challenge.site_key,
        });

        if let Some(egress) = egress {
            task["type"] = json!(challenge.kind.task_type().replace("ProxyLess", ""));
            task["proxyType"] = json!("http");
            task["proxyAddress"] = json!(egress.host);
            task["proxyPort"] = json!(egress.port);
            task["proxyLogin"] = json!(egress.username);
            task["proxyPassword"] = json!(egress.password);
        }

        task
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, CaptchaError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptchaError::Timeout
                } else if e.is_connect() {
                    CaptchaError::ConnectionFailed(e.to_string())
                } else {
                    CaptchaError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CaptchaError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response)
    }

    async fn create_task(
        &self,
        challenge: &Challenge,
        egress: Option<&EgressDescriptor>,
    ) -> Result<Option<String>, CaptchaError> {
        let body = json!({
            "clientKey": self.config.api_key,
            "task": self.build_task(challenge, egress),
        });

        let response: CreateTaskResponse = self
            .post("/createTask", body)
            .await?
            .json()
            .await
            .map_err(|e| CaptchaError::ApiError(format!("Failed to parse response: {}", e)))?;

        if response.error_id != 0 {
            warn!(
                kind = challenge.kind.as_str(),
                "Solver rejected task: {}",
                response.error_description.unwrap_or_default()
            );
            return Ok(None);
        }

        Ok(response.task_id)
    }

    async fn poll_result(
        &self,
        task_id: &str,
        challenge: &Challenge,
    ) -> Result<Option<CaptchaToken>, CaptchaError> {
        for _ in 0..self.config.max_polls {
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;

            let body = json!({
                "clientKey": self.config.api_key,
                "taskId": task_id,
            });

            let response: TaskResultResponse = self
                .post("/getTaskResult", body)
                .await?
                .json()
                .await
                .map_err(|e| CaptchaError::ApiError(format!("Failed to parse response: {}", e)))?;

            match response.status.as_deref() {
                Some("ready") => {
                    let token = response
                        .solution
                        .as_ref()
                        .and_then(|s| s.get(challenge.kind.solution_field()))
                        .and_then(|t| t.as_str())
                        .map(|t| t.to_string());

                    return Ok(token.map(|token| CaptchaToken {
                        kind: challenge.kind,
                        token,
                    }));
                }
                Some("failed") => {
                    warn!(kind = challenge.kind.as_str(), "Solver reported task failure");
                    return Ok(None);
                }
                _ => continue,
            }
        }

        warn!(
            kind = challenge.kind.as_str(),
            polls = self.config.max_polls,
            "Solver poll budget exhausted"
        );
        Ok(None)
    }
}

#[async_trait]
impl CaptchaSolver for CapSolverClient {
    fn name(&self) -> &str {
        "capsolver"
    }

    async fn solve(
        &self,
        challenge: &Challenge,
        egress: Option<&EgressDescriptor>,
    ) -> Result<Option<CaptchaToken>, CaptchaError> {
        if self.config.api_key.is_empty() {
            debug!("No solver API key configured, skipping challenge");
            return Ok(None);
        }

        let Some(task_id) = self.create_task(challenge, egress).await? else {
            return Ok(None);
        };

        debug!(
            kind = challenge.kind.as_str(),
            task_id = task_id.as_str(),
            "Solver task created, polling for result"
        );

        self.poll_result(&task_id, challenge).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::ChallengeKind;

    fn client() -> CapSolverClient {
        CapSolverClient::new(CaptchaConfig {
            api_key: "key".to_string(),
            url: "https://api.capsolver.com".to_string(),
            poll_interval_ms: 2000,
            max_polls: 60,
            timeout_secs: 30,
        })
    }

    fn challenge() -> Challenge {
        Challenge {
            kind: ChallengeKind::Turnstile,
            site_key: "0x4AAAAkey".to_string(),
            page_url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_build_task_proxyless() {
        let task = client().build_task(&challenge(), None);
        assert_eq!(task["type"], "AntiTurnstileTaskProxyLess");
        assert_eq!(task["websiteKey"], "0x4AAAAkey");
        assert!(task.get("proxyAddress").is_none());
    }

    #[test]
    fn test_build_task_with_egress() {
        let egress = EgressDescriptor {
            host: "203.0.113.7".to_string(),
            port: 5470,
            username: "u".to_string(),
            password: "p".to_string(),
        };
        let task = client().build_task(&challenge(), Some(&egress));
        assert_eq!(task["type"], "AntiTurnstileTask");
        assert_eq!(task["proxyAddress"], "203.0.113.7");
        assert_eq!(task["proxyPort"], 5470);
        assert_eq!(task["proxyLogin"], "u");
    }

    #[tokio::test]
    async fn test_solve_without_api_key_is_none() {
        let client = CapSolverClient::new(CaptchaConfig {
            api_key: String::new(),
            url: "https://api.capsolver.com".to_string(),
            poll_interval_ms: 2000,
            max_polls: 60,
            timeout_secs: 30,
        });
        let result = client.solve(&challenge(), None).await.unwrap();
        assert!(result.is_none());
    }
}
