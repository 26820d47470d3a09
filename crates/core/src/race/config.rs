use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Race engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RaceConfig {
    /// Workers launched per round (default: 3).
    #[serde(default = "default_workers_per_round")]
    pub workers_per_round: usize,
    /// Maximum rounds before returning the empty terminal result
    /// (default: 5).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Process-wide cap on simultaneously active automation sessions
    /// (default: 4).
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    /// Hard wall-clock deadline per attempt in seconds (default: 180).
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,
    /// Neutral URLs requested through the egress identity before the
    /// real task starts. Empty disables warmup.
    #[serde(default = "default_warmup_urls")]
    pub warmup_urls: Vec<String>,
    /// Human-like pacing bounds applied at every step boundary, in
    /// milliseconds (defaults: 300..1200). `pacing_max_ms = 0` disables
    /// pacing.
    #[serde(default = "default_pacing_min")]
    pub pacing_min_ms: u64,
    #[serde(default = "default_pacing_max")]
    pub pacing_max_ms: u64,
    /// Root directory for per-attempt working areas (default: "scans").
    #[serde(default = "default_scan_dir")]
    pub scan_dir: PathBuf,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            workers_per_round: default_workers_per_round(),
            max_rounds: default_max_rounds(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            worker_timeout_secs: default_worker_timeout(),
            warmup_urls: default_warmup_urls(),
            pacing_min_ms: default_pacing_min(),
            pacing_max_ms: default_pacing_max(),
            scan_dir: default_scan_dir(),
        }
    }
}

fn default_workers_per_round() -> usize {
    3
}

fn default_max_rounds() -> u32 {
    5
}

fn default_max_concurrent_sessions() -> usize {
    4
}

fn default_worker_timeout() -> u64 {
    180
}

fn default_warmup_urls() -> Vec<String> {
    vec!["https://ipinfo.io/json".to_string()]
}

fn default_pacing_min() -> u64 {
    300
}

fn default_pacing_max() -> u64 {
    1200
}

fn default_scan_dir() -> PathBuf {
    PathBuf::from("scans")
}

/// Result validator thresholds.
///
/// These are heuristics, documented as approximate: the length floor can
/// reject a legitimately short answer and the denylist can pass garbage
/// it has no phrase for. Tune per deployment rather than treating the
/// defaults as a contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// Minimum length for plain-text payloads (default: 30).
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
    /// Failure-signature substrings, matched case-insensitively against
    /// the whole serialized payload.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    /// Field names expected on extracted records; sharing two or more
    /// marks a structured result as a strong match.
    #[serde(default = "default_expected_fields")]
    pub expected_fields: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_text_len: default_min_text_len(),
            denylist: default_denylist(),
            expected_fields: default_expected_fields(),
        }
    }
}

fn default_min_text_len() -> usize {
    30
}

fn default_denylist() -> Vec<String> {
    [
        "access denied",
        "permission denied",
        "verify you are human",
        "unusual traffic",
        "captcha",
        "just a moment",
        "agent error:",
        "forbidden",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_expected_fields() -> Vec<String> {
    ["title", "url", "link", "date", "id", "name"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_config_defaults() {
        let config = RaceConfig::default();
        assert_eq!(config.workers_per_round, 3);
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.max_concurrent_sessions, 4);
        assert_eq!(config.worker_timeout_secs, 180);
        assert!(config.pacing_min_ms <= config.pacing_max_ms);
    }

    #[test]
    fn test_race_config_partial_toml() {
        let config: RaceConfig = toml::from_str("workers_per_round = 8").unwrap();
        assert_eq!(config.workers_per_round, 8);
        assert_eq!(config.max_rounds, 5);
    }

    #[test]
    fn test_validator_config_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.denylist.iter().any(|p| p == "access denied"));
        assert!(config.expected_fields.len() >= 2);
    }
}
