//! Mock egress pool provider for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::egress::{EgressDescriptor, EgressError, EgressProvider};

/// Mock implementation of the EgressProvider trait.
pub struct MockEgressProvider {
    descriptors: RwLock<Vec<EgressDescriptor>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

impl MockEgressProvider {
    /// Create a provider serving the given descriptors.
    pub fn with_descriptors(descriptors: Vec<EgressDescriptor>) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
            fail: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the served descriptors.
    pub async fn set_descriptors(&self, descriptors: Vec<EgressDescriptor>) {
        *self.descriptors.write().await = descriptors;
    }

    /// Make subsequent fetches fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of fetch calls.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EgressProvider for MockEgressProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self) -> Result<Vec<EgressDescriptor>, EgressError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(EgressError::ConnectionFailed("mock failure".to_string()));
        }

        let descriptors = self.descriptors.read().await.clone();
        if descriptors.is_empty() {
            return Err(EgressError::EmptyPool);
        }

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_fetch_returns_descriptors() {
        let provider = MockEgressProvider::with_descriptors(vec![fixtures::egress("a")]);
        let descriptors = provider.fetch().await.unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_errors() {
        let provider = MockEgressProvider::with_descriptors(vec![]);
        assert!(matches!(
            provider.fetch().await,
            Err(EgressError::EmptyPool)
        ));
    }
}
