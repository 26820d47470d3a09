//! Race coordinator: arbitrates a round's single winner.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::egress::EgressDescriptor;
use crate::metrics;

use super::types::{RaceState, TaskRequest, WorkerOutcome};
use super::worker::{RaceContext, Worker};

/// Launches a round's worker cohort and arbitrates its outcome.
pub struct RaceCoordinator {
    ctx: Arc<RaceContext>,
}

impl RaceCoordinator {
    pub fn new(ctx: Arc<RaceContext>) -> Self {
        Self { ctx }
    }

    /// Race `descriptors.len()` workers and return the round's outcome.
    ///
    /// The outcome channel holds a single slot; the claim mutex inside
    /// `RaceState` guarantees at most one worker ever sends. `None` from
    /// the receiver means every worker finished without claiming.
    ///
    /// Whatever the result, the cohort is fully drained — working areas
    /// removed, gate slots released — before this returns, so nothing
    /// leaks past the round boundary.
    pub async fn run_round(
        &self,
        task: &Arc<TaskRequest>,
        descriptors: &[EgressDescriptor],
        round: u32,
    ) -> Option<WorkerOutcome> {
        let started = Instant::now();
        let state = Arc::new(RaceState::new());
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<WorkerOutcome>(1);

        let mut cohort = JoinSet::new();
        for (id, egress) in descriptors.iter().enumerate() {
            let worker = Worker::new(
                id,
                round,
                egress.clone(),
                Arc::clone(&self.ctx),
                Arc::clone(&state),
            );
            cohort.spawn(worker.run(Arc::clone(task), outcome_tx.clone()));
        }
        drop(outcome_tx);

        // Some(..) the instant a worker claims; None once every sender
        // has dropped without a claim.
        let outcome = outcome_rx.recv().await;

        // Confirm cancellation for any still-running workers, then await
        // their full drain.
        state.cancel();
        while let Some(joined) = cohort.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(round, "Worker task panicked: {}", e);
                } else {
                    debug!(round, "Worker task aborted: {}", e);
                }
            }
        }

        let result = if outcome.is_some() { "claimed" } else { "failed" };
        metrics::ROUND_OUTCOMES.with_label_values(&[result]).inc();
        metrics::ROUND_DURATION
            .with_label_values(&[result])
            .observe(started.elapsed().as_secs_f64());

        match &outcome {
            Some(winner) => info!(
                round,
                worker = winner.worker_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Round decided"
            ),
            None => info!(
                round,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Round produced no outcome"
            ),
        }

        outcome
    }
}
