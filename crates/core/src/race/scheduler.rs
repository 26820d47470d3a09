//! Round scheduler: bounded retry of race rounds over rotated egress
//! slices.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::ArtifactAssembler;
use crate::captcha::CaptchaSolver;
use crate::config::Config;
use crate::egress::{EgressDescriptor, EgressPool};
use crate::engine::AutomationEngine;

use super::coordinator::RaceCoordinator;
use super::limiter::SessionGate;
use super::types::{TaskRequest, TaskResult};
use super::validator::ResultValidator;
use super::worker::RaceContext;

/// Scheduler status for the API surface.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub workers_per_round: usize,
    pub max_rounds: u32,
    pub session_capacity: usize,
    pub sessions_available: usize,
}

/// Runs rounds sequentially until one produces an outcome or the round
/// budget is exhausted. Only workers within a round run concurrently;
/// rounds never overlap.
pub struct RoundScheduler {
    ctx: Arc<RaceContext>,
    coordinator: RaceCoordinator,
    pool: Arc<EgressPool>,
}

impl RoundScheduler {
    /// Assemble a scheduler from configuration and collaborators.
    pub fn new(
        config: &Config,
        engine: Arc<dyn AutomationEngine>,
        captcha: Option<Arc<dyn CaptchaSolver>>,
        assembler: Option<Arc<dyn ArtifactAssembler>>,
        pool: Arc<EgressPool>,
    ) -> Self {
        let ctx = Arc::new(RaceContext {
            config: config.race.clone(),
            engine,
            captcha,
            assembler,
            validator: ResultValidator::new(config.validator.clone()),
            gate: SessionGate::new(config.race.max_concurrent_sessions),
        });

        Self {
            coordinator: RaceCoordinator::new(Arc::clone(&ctx)),
            ctx,
            pool,
        }
    }

    /// Execute a task to its terminal result.
    ///
    /// Exhausting all rounds is a valid terminal state, reported as the
    /// empty result — never as an error.
    pub async fn run(&self, task: TaskRequest) -> TaskResult {
        let task = Arc::new(task);
        let config = &self.ctx.config;

        // One snapshot for the whole request; a mid-request pool refresh
        // only affects future requests.
        let snapshot = self.pool.snapshot().await;
        if snapshot.is_empty() {
            warn!("Egress pool is empty, returning empty result");
            return TaskResult::empty();
        }

        let k = config.workers_per_round.min(snapshot.len()).max(1);

        for round in 1..=config.max_rounds {
            let slice = round_slice(&snapshot, round, k);
            info!(
                round,
                max_rounds = config.max_rounds,
                workers = k,
                "Launching race round"
            );

            if let Some(outcome) = self.coordinator.run_round(&task, &slice, round).await {
                return TaskResult::from_outcome(outcome);
            }

            warn!(round, "Round fully failed");
        }

        info!(
            rounds = config.max_rounds,
            "All rounds exhausted, returning empty result"
        );
        TaskResult::empty()
    }

    /// Current engine status.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            workers_per_round: self.ctx.config.workers_per_round,
            max_rounds: self.ctx.config.max_rounds,
            session_capacity: self.ctx.gate.capacity(),
            sessions_available: self.ctx.gate.available(),
        }
    }
}

/// Select a round's slice of `k` descriptors, rotating through the pool
/// so repeated rounds are not guaranteed identical egress points.
fn round_slice(pool: &[EgressDescriptor], round: u32, k: usize) -> Vec<EgressDescriptor> {
    let start = (round as usize - 1) * k % pool.len();
    (0..k).map(|i| pool[(start + i) % pool.len()].clone()).collect()
}
