//! HTTP egress pool provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::EgressProviderConfig;

use super::{EgressDescriptor, EgressError, EgressProvider};

/// Pool provider that fetches a JSON list of descriptors over HTTP.
pub struct HttpEgressProvider {
    client: Client,
    config: EgressProviderConfig,
}

impl HttpEgressProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: EgressProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl EgressProvider for HttpEgressProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<EgressDescriptor>, EgressError> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EgressError::Timeout
                } else if e.is_connect() {
                    EgressError::ConnectionFailed(e.to_string())
                } else {
                    EgressError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EgressError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let descriptors: Vec<EgressDescriptor> = response
            .json()
            .await
            .map_err(|e| EgressError::ApiError(format!("Failed to parse response: {}", e)))?;

        if descriptors.is_empty() {
            return Err(EgressError::EmptyPool);
        }

        debug!(count = descriptors.len(), "Fetched egress descriptors");

        Ok(descriptors)
    }
}
