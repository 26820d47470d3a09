use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::egress::EgressDescriptor;
use crate::race::{RaceConfig, ValidatorConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// Automation engine endpoint (required).
    pub engine: EngineConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    /// CAPTCHA solving service (optional; bot walls are waited out when absent).
    #[serde(default)]
    pub captcha: Option<CaptchaConfig>,
    /// Artifact hosting service (optional; winners report no artifact when absent).
    #[serde(default)]
    pub artifact: Option<ArtifactConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Automation engine (step-wise browser driver) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Engine base URL (e.g., "http://localhost:9333")
    pub url: String,
    /// Per-request timeout in seconds (default: 120).
    ///
    /// This bounds individual driver requests only; the end-to-end attempt
    /// deadline is `race.worker_timeout_secs`.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u32,
}

fn default_engine_timeout() -> u32 {
    120
}

/// Egress pool configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EgressConfig {
    /// Static descriptors, used directly when no provider is configured
    /// and as the fallback list when the provider never succeeds.
    #[serde(default)]
    pub pool: Vec<EgressDescriptor>,
    /// Remote pool provider (optional).
    #[serde(default)]
    pub provider: Option<EgressProviderConfig>,
    /// Background refresh period in seconds (default: 300).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Minimum spacing between two provider fetches in seconds (default: 30).
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_min_refresh_interval() -> u64 {
    30
}

/// Remote egress pool provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EgressProviderConfig {
    /// Provider URL returning a JSON list of descriptors.
    pub url: String,
    /// Request timeout in seconds (default: 15).
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u32,
}

fn default_provider_timeout() -> u32 {
    15
}

/// CAPTCHA solving service configuration (create-then-poll protocol)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptchaConfig {
    /// Service API key. An empty key disables solving without erroring.
    pub api_key: String,
    /// Service base URL (default: "https://api.capsolver.com").
    #[serde(default = "default_captcha_url")]
    pub url: String,
    /// Fixed interval between result polls in milliseconds (default: 2000).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum result polls per challenge (default: 60).
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_captcha_timeout")]
    pub timeout_secs: u32,
}

fn default_captcha_url() -> String {
    "https://api.capsolver.com".to_string()
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_max_polls() -> u32 {
    60
}

fn default_captcha_timeout() -> u32 {
    30
}

/// Artifact hosting service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactConfig {
    /// Frame upload endpoint.
    pub upload_url: String,
    /// Upload timeout in seconds (default: 60).
    #[serde(default = "default_artifact_timeout")]
    pub timeout_secs: u32,
    /// Directory for locally retained artifacts when hosting fails
    /// (default: "artifacts").
    #[serde(default = "default_artifact_dir")]
    pub output_dir: PathBuf,
}

fn default_artifact_timeout() -> u32 {
    60
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub race: RaceConfig,
    pub validator: ValidatorConfig,
    pub engine: EngineConfig,
    pub egress: SanitizedEgressConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<SanitizedCaptchaConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactConfig>,
}

/// Sanitized egress config (proxy credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEgressConfig {
    pub pool_size: usize,
    pub provider_configured: bool,
    pub refresh_interval_secs: u64,
}

/// Sanitized CAPTCHA config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCaptchaConfig {
    pub api_key_configured: bool,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            race: config.race.clone(),
            validator: config.validator.clone(),
            engine: config.engine.clone(),
            egress: SanitizedEgressConfig {
                pool_size: config.egress.pool.len(),
                provider_configured: config.egress.provider.is_some(),
                refresh_interval_secs: config.egress.refresh_interval_secs,
            },
            captcha: config.captcha.as_ref().map(|c| SanitizedCaptchaConfig {
                api_key_configured: !c.api_key.is_empty(),
                poll_interval_ms: c.poll_interval_ms,
                max_polls: c.max_polls,
            }),
            artifact: config.artifact.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config {
            server: ServerConfig::default(),
            race: RaceConfig::default(),
            validator: ValidatorConfig::default(),
            engine: EngineConfig {
                url: "http://localhost:9333".to_string(),
                timeout_secs: default_engine_timeout(),
            },
            egress: EgressConfig::default(),
            captcha: None,
            artifact: None,
        }
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_sanitized_config_redacts_credentials() {
        let mut config = minimal_config();
        config.egress.pool.push(EgressDescriptor {
            host: "203.0.113.7".to_string(),
            port: 5470,
            username: "user".to_string(),
            password: "hunter2".to_string(),
        });
        config.captcha = Some(CaptchaConfig {
            api_key: "CAP-secret".to_string(),
            url: default_captcha_url(),
            poll_interval_ms: 2000,
            max_polls: 60,
            timeout_secs: 30,
        });

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();

        assert!(!json.contains("hunter2"));
        assert!(!json.contains("CAP-secret"));
        assert_eq!(sanitized.egress.pool_size, 1);
        assert!(sanitized.captcha.unwrap().api_key_configured);
    }

    #[test]
    fn test_sanitized_config_omits_absent_sections() {
        let config = minimal_config();
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();

        assert!(!json.contains("captcha"));
        assert!(!json.contains("artifact"));
    }
}
