use std::sync::Arc;

use harrier_core::{Config, EgressPool, RoundScheduler, SanitizedConfig, SchedulerStatus};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<RoundScheduler>,
    pool: Arc<EgressPool>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<RoundScheduler>, pool: Arc<EgressPool>) -> Self {
        Self {
            config,
            scheduler,
            pool,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &RoundScheduler {
        &self.scheduler
    }

    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub async fn pool_size(&self) -> usize {
        self.pool.len().await
    }
}
