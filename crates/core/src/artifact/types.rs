//! Types for artifact assembly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reference to an assembled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ArtifactRef {
    /// Hosted by the assembly service.
    Hosted { url: String },
    /// Retained locally after hosting failed.
    Local { path: PathBuf },
}

impl ArtifactRef {
    /// A caller-facing locator string: the hosted URL, or the local path.
    pub fn locator(&self) -> String {
        match self {
            ArtifactRef::Hosted { url } => url.clone(),
            ArtifactRef::Local { path } => path.display().to_string(),
        }
    }
}

/// Errors that can occur during artifact assembly.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Assembly service connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Assembly service API error: {0}")]
    ApiError(String),

    #[error("Filesystem error: {0}")]
    Io(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for artifact assembly backends.
#[async_trait]
pub trait ArtifactAssembler: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Assemble the ordered frames in `frames_dir` into an artifact.
    async fn assemble(
        &self,
        session_id: &str,
        frames_dir: &Path,
    ) -> Result<ArtifactRef, ArtifactError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_for_hosted() {
        let artifact = ArtifactRef::Hosted {
            url: "https://frames.example/abc.mp4".to_string(),
        };
        assert_eq!(artifact.locator(), "https://frames.example/abc.mp4");
    }

    #[test]
    fn test_locator_for_local() {
        let artifact = ArtifactRef::Local {
            path: PathBuf::from("/tmp/artifacts/abc"),
        };
        assert_eq!(artifact.locator(), "/tmp/artifacts/abc");
    }

    #[test]
    fn test_artifact_ref_serialization() {
        let artifact = ArtifactRef::Hosted {
            url: "https://frames.example/abc.mp4".to_string(),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"kind\":\"hosted\""));
    }
}
