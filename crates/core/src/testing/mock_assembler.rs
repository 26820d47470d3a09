//! Mock artifact assembler for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::artifact::{ArtifactAssembler, ArtifactError, ArtifactRef};

/// Mock implementation of the ArtifactAssembler trait.
///
/// Records the session ids it assembled for; the count doubles as a
/// claim counter in race tests, since only a round's winner assembles.
pub struct MockArtifactAssembler {
    assemblies: RwLock<Vec<String>>,
    fail: AtomicBool,
}

impl Default for MockArtifactAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArtifactAssembler {
    pub fn new() -> Self {
        Self {
            assemblies: RwLock::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent assemblies fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Session ids assembled so far.
    pub async fn recorded_sessions(&self) -> Vec<String> {
        self.assemblies.read().await.clone()
    }

    /// Number of assemble calls.
    pub async fn assembly_count(&self) -> usize {
        self.assemblies.read().await.len()
    }
}

#[async_trait]
impl ArtifactAssembler for MockArtifactAssembler {
    fn name(&self) -> &str {
        "mock"
    }

    async fn assemble(
        &self,
        session_id: &str,
        _frames_dir: &Path,
    ) -> Result<ArtifactRef, ArtifactError> {
        self.assemblies.write().await.push(session_id.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(ArtifactError::ApiError("mock failure".to_string()));
        }

        Ok(ArtifactRef::Hosted {
            url: format!("https://frames.test/{}.mp4", session_id),
        })
    }
}
