use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Race parameters are non-zero and pacing bounds are ordered
/// - An egress source exists (static pool or provider)
/// - Collaborator URLs are non-empty when their section is present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Race validation
    if config.race.workers_per_round == 0 {
        return Err(ConfigError::ValidationError(
            "race.workers_per_round must be at least 1".to_string(),
        ));
    }
    if config.race.max_rounds == 0 {
        return Err(ConfigError::ValidationError(
            "race.max_rounds must be at least 1".to_string(),
        ));
    }
    if config.race.max_concurrent_sessions == 0 {
        return Err(ConfigError::ValidationError(
            "race.max_concurrent_sessions must be at least 1".to_string(),
        ));
    }
    if config.race.worker_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "race.worker_timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.race.pacing_min_ms > config.race.pacing_max_ms {
        return Err(ConfigError::ValidationError(
            "race.pacing_min_ms cannot exceed race.pacing_max_ms".to_string(),
        ));
    }

    // Engine validation
    if config.engine.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.url cannot be empty".to_string(),
        ));
    }

    // Egress validation: rounds need at least one exit point to race over
    if config.egress.pool.is_empty() && config.egress.provider.is_none() {
        return Err(ConfigError::ValidationError(
            "egress requires a static pool or a provider".to_string(),
        ));
    }

    if let Some(ref artifact) = config.artifact {
        if artifact.upload_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "artifact.upload_url cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
