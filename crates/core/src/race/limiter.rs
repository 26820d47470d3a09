//! Session admission gate.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::metrics;

/// Counting admission gate bounding simultaneously active automation
/// sessions process-wide.
///
/// `acquire` blocks until a slot frees; the returned permit releases its
/// slot on drop, so every worker exit path — success, error, timeout,
/// cancellation, panic unwind — gives the slot back. Queueing is
/// FIFO-ish; starvation avoidance is a non-goal.
#[derive(Clone)]
pub struct SessionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl SessionGate {
    /// Create a gate with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> SessionPermit {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("session gate semaphore closed");
        metrics::ACTIVE_SESSIONS.inc();
        SessionPermit { _permit: permit }
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// RAII slot handle; dropping it releases the slot.
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        metrics::ACTIVE_SESSIONS.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let gate = SessionGate::new(2);
        assert_eq!(gate.available(), 2);

        let permit = gate.acquire().await;
        assert_eq!(gate.available(), 1);

        drop(permit);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let gate = SessionGate::new(1);
        let held = gate.acquire().await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(held);
        let granted = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(granted.is_ok());
    }

    #[tokio::test]
    async fn test_permit_released_on_task_abort() {
        let gate = SessionGate::new(1);

        let gate_for_task = gate.clone();
        let handle = tokio::spawn(async move {
            let _permit = gate_for_task.acquire().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        // Let the task take the slot, then kill it mid-hold
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.available(), 0);
        handle.abort();
        let _ = handle.await;

        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_capacity_reporting() {
        let gate = SessionGate::new(4);
        assert_eq!(gate.capacity(), 4);
        let _a = gate.acquire().await;
        let _b = gate.acquire().await;
        assert_eq!(gate.capacity(), 4);
        assert_eq!(gate.available(), 2);
    }
}
