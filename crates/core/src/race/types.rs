//! Types for the race engine.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::artifact::ArtifactRef;

/// A natural-language browsing task. Immutable once submitted; the round
/// scheduler owns it for the request's lifetime and shares it with
/// workers behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub prompt: String,
    pub max_steps: u32,
    pub model: String,
}

/// Outcome reported by the single worker that won a round's claim.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerOutcome {
    pub worker_id: usize,
    pub payload: serde_json::Value,
    pub steps_taken: u32,
    pub artifact: Option<ArtifactRef>,
}

/// Caller-visible result of a task.
///
/// The all-rounds-failed case is the empty value, not an error: callers
/// always receive a structurally valid result.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub payload: Option<serde_json::Value>,
    pub steps_taken: u32,
    pub artifact: Option<ArtifactRef>,
}

impl TaskResult {
    /// Terminal empty result: zero steps, no payload, no artifact.
    pub fn empty() -> Self {
        Self {
            payload: None,
            steps_taken: 0,
            artifact: None,
        }
    }

    pub fn from_outcome(outcome: WorkerOutcome) -> Self {
        Self {
            payload: Some(outcome.payload),
            steps_taken: outcome.steps_taken,
            artifact: outcome.artifact,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }
}

/// Shared state of one race round.
///
/// The cancellation flag is single-writer-many-reader and never unset
/// once raised. The claim mutex guards the flag's check-then-set so that
/// exactly one worker per round can win, even when two validate in the
/// same scheduling tick. The mutex is held only for that check-then-set,
/// never across I/O.
#[derive(Debug, Default)]
pub struct RaceState {
    cancelled: AtomicBool,
    claim: Mutex<()>,
}

impl RaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the round has been cancelled (a winner claimed, or the
    /// coordinator is tearing the round down).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Raise the cancellation flag. Idempotent; the flag is never unset.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Attempt to claim the round's single victory.
    ///
    /// Acquires the claim mutex, re-checks the flag (another worker may
    /// have claimed between validation and this call), and only then
    /// raises it. Returns whether the caller is the winner.
    pub async fn try_claim(&self) -> bool {
        let _guard = self.claim.lock().await;
        if self.cancelled.load(Ordering::SeqCst) {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        true
    }
}
