//! Hosted artifact assembler with local fallback.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ArtifactConfig;

use super::{ArtifactAssembler, ArtifactError, ArtifactRef};

/// A valid 1x1 PNG, written when an attempt captured no screenshots so
/// the assembly service always receives at least one frame.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15,
    0xC4, 0x89, //
    0x00, 0x00, 0x00, 0x0A, b'I', b'D', b'A', b'T', // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, //
    0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82, // IEND
];

/// Assembler that uploads frames to a hosting service, falling back to a
/// local copy when hosting fails.
pub struct HostedAssembler {
    client: Client,
    config: ArtifactConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl HostedAssembler {
    /// Create a new assembler with the given configuration.
    pub fn new(config: ArtifactConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Sorted PNG frames in the directory.
    fn collect_frames(frames_dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
        let entries = std::fs::read_dir(frames_dir).map_err(|e| ArtifactError::Io(e.to_string()))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect();
        frames.sort();

        Ok(frames)
    }

    async fn upload(
        &self,
        session_id: &str,
        frames: &[PathBuf],
    ) -> Result<ArtifactRef, ArtifactError> {
        let mut form = Form::new().text("session_id", session_id.to_string());

        for frame in frames {
            let data = tokio::fs::read(frame)
                .await
                .map_err(|e| ArtifactError::Io(e.to_string()))?;
            let name = frame
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame.png".to_string());
            let part = Part::bytes(data)
                .file_name(name)
                .mime_str("image/png")
                .map_err(|e| ArtifactError::Io(e.to_string()))?;
            form = form.part("frames", part);
        }

        let response = self
            .client
            .post(&self.config.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ArtifactError::Timeout
                } else if e.is_connect() {
                    ArtifactError::ConnectionFailed(e.to_string())
                } else {
                    ArtifactError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArtifactError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ArtifactError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(ArtifactRef::Hosted { url: uploaded.url })
    }

    /// Copy frames into the local output directory. The attempt's own
    /// workspace is deleted at round end, so the copy must be made now.
    async fn retain_locally(
        &self,
        session_id: &str,
        frames: &[PathBuf],
    ) -> Result<ArtifactRef, ArtifactError> {
        let dest = self.config.output_dir.join(session_id);
        tokio::fs::create_dir_all(&dest)
            .await
            .map_err(|e| ArtifactError::Io(e.to_string()))?;

        for frame in frames {
            if let Some(name) = frame.file_name() {
                tokio::fs::copy(frame, dest.join(name))
                    .await
                    .map_err(|e| ArtifactError::Io(e.to_string()))?;
            }
        }

        Ok(ArtifactRef::Local { path: dest })
    }
}

#[async_trait]
impl ArtifactAssembler for HostedAssembler {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn assemble(
        &self,
        session_id: &str,
        frames_dir: &Path,
    ) -> Result<ArtifactRef, ArtifactError> {
        let mut frames = Self::collect_frames(frames_dir)?;

        if frames.is_empty() {
            debug!(session_id, "No frames captured, writing placeholder");
            let placeholder = frames_dir.join("step_0000_placeholder.png");
            std::fs::write(&placeholder, PLACEHOLDER_PNG)
                .map_err(|e| ArtifactError::Io(e.to_string()))?;
            frames.push(placeholder);
        }

        match self.upload(session_id, &frames).await {
            Ok(artifact) => {
                info!(session_id, url = artifact.locator(), "Frames hosted");
                Ok(artifact)
            }
            Err(e) => {
                warn!(
                    session_id,
                    "Frame hosting failed: {}, retaining frames locally", e
                );
                self.retain_locally(session_id, &frames).await
            }
        }
    }
}
