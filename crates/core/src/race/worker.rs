//! Worker: one end-to-end attempt bound to one egress identity.
//!
//! Lifecycle: INIT (gate admission + private working area) -> WARMUP
//! (best-effort egress priming) -> RUNNING (engine delegation under a
//! hard wall-clock deadline, with the per-step hook as the cooperative
//! cancellation checkpoint) -> EXTRACTING -> claim. Every terminal state
//! releases the gate slot and removes the working area.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactAssembler, ArtifactRef};
use crate::captcha::{detect_challenge, is_js_wall, CaptchaSolver};
use crate::egress::EgressDescriptor;
use crate::engine::{
    prepare_prompt, AutomationEngine, EngineError, PreparedTask, StepDirective, StepInterrupt,
    StepObserver, StepRecord,
};
use crate::metrics;

use super::config::RaceConfig;
use super::extract::{clean_payload, extract_payload};
use super::limiter::SessionGate;
use super::types::{RaceState, TaskRequest, WorkerOutcome};
use super::validator::ResultValidator;

/// Collaborators shared by every worker in a race.
pub struct RaceContext {
    pub config: RaceConfig,
    pub engine: Arc<dyn AutomationEngine>,
    pub captcha: Option<Arc<dyn CaptchaSolver>>,
    pub assembler: Option<Arc<dyn ArtifactAssembler>>,
    pub validator: ResultValidator,
    pub gate: SessionGate,
}

/// Internal attempt failures. These never leave the worker: the
/// top-level boundary in `run` logs them and reports no outcome.
#[derive(Debug, thiserror::Error)]
enum WorkerError {
    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("engine error: {0}")]
    Engine(EngineError),
}

/// Private per-attempt working area, removed on every exit path.
struct AttemptWorkspace {
    dir: PathBuf,
}

impl AttemptWorkspace {
    fn create(root: &Path, session_id: &str) -> std::io::Result<Self> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let dir = root.join(format!("{}_{}", stamp, session_id));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for AttemptWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!("Failed to remove attempt workspace {:?}: {}", self.dir, e);
        }
    }
}

/// Decode and persist a step screenshot into the working area.
fn save_frame(frames_dir: &Path, index: u32, b64: &str) -> std::io::Result<()> {
    // Data URLs carry a "data:image/png;base64," prefix
    let raw = b64.rsplit_once(',').map(|(_, tail)| tail).unwrap_or(b64);

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let is_png = bytes.starts_with(&[0x89, b'P', b'N', b'G']);
    let is_jpeg = bytes.starts_with(&[0xFF, 0xD8]);
    if !is_png && !is_jpeg {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "not a PNG or JPEG image",
        ));
    }

    std::fs::write(frames_dir.join(format!("step_{:04}.png", index)), bytes)
}

/// Per-step hook handed to the engine: the only point where a running
/// attempt can observe cancellation, handle bot walls, and pace itself.
struct WorkerStepHook {
    worker_id: usize,
    state: Arc<RaceState>,
    captcha: Option<Arc<dyn CaptchaSolver>>,
    egress: EgressDescriptor,
    frames_dir: PathBuf,
    pacing_ms: (u64, u64),
}

#[async_trait]
impl StepObserver for WorkerStepHook {
    async fn on_step(&self, step: &StepRecord) -> Result<StepDirective, StepInterrupt> {
        if self.state.is_cancelled() {
            return Err(StepInterrupt);
        }

        let mut directive = StepDirective::Continue;

        if let Some(page) = &step.page {
            if is_js_wall(&page.html) {
                // These clear on their own; later steps re-check
                debug!(
                    worker = self.worker_id,
                    step = step.index,
                    "JS interstitial present, waiting it out"
                );
            } else if let Some(challenge) = detect_challenge(&page.url, &page.html, &page.frame_urls)
            {
                self.handle_challenge(step, challenge, &mut directive).await;
            }
        }

        if let Some(b64) = &step.screenshot_b64 {
            if let Err(e) = save_frame(&self.frames_dir, step.index, b64) {
                debug!(
                    worker = self.worker_id,
                    step = step.index,
                    "Failed to save frame: {}",
                    e
                );
            }
        }

        let (min, max) = self.pacing_ms;
        if max > 0 {
            let pause = {
                let mut rng = rand::thread_rng();
                rng.gen_range(min..=max)
            };
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }

        Ok(directive)
    }
}

impl WorkerStepHook {
    async fn handle_challenge(
        &self,
        step: &StepRecord,
        challenge: crate::captcha::Challenge,
        directive: &mut StepDirective,
    ) {
        let kind = challenge.kind.as_str();
        let Some(solver) = &self.captcha else {
            debug!(
                worker = self.worker_id,
                step = step.index,
                kind,
                "Challenge detected but no solver configured"
            );
            return;
        };

        match solver.solve(&challenge, Some(&self.egress)).await {
            Ok(Some(token)) => {
                metrics::CAPTCHA_CHALLENGES
                    .with_label_values(&[kind, "solved"])
                    .inc();
                info!(
                    worker = self.worker_id,
                    step = step.index,
                    kind,
                    "Challenge solved, token queued for injection"
                );
                *directive = StepDirective::InjectCaptchaToken(token);
            }
            Ok(None) => {
                metrics::CAPTCHA_CHALLENGES
                    .with_label_values(&[kind, "unsolved"])
                    .inc();
                debug!(
                    worker = self.worker_id,
                    step = step.index,
                    kind,
                    "Solver produced no token"
                );
            }
            // Single-step errors never abort the attempt
            Err(e) => {
                metrics::CAPTCHA_CHALLENGES
                    .with_label_values(&[kind, "error"])
                    .inc();
                warn!(
                    worker = self.worker_id,
                    step = step.index,
                    "Solver error: {}",
                    e
                );
            }
        }
    }
}

/// One independent attempt to complete the task via one egress identity.
pub struct Worker {
    id: usize,
    round: u32,
    egress: EgressDescriptor,
    ctx: Arc<RaceContext>,
    state: Arc<RaceState>,
}

impl Worker {
    pub fn new(
        id: usize,
        round: u32,
        egress: EgressDescriptor,
        ctx: Arc<RaceContext>,
        state: Arc<RaceState>,
    ) -> Self {
        Self {
            id,
            round,
            egress,
            ctx,
            state,
        }
    }

    /// Drive the attempt to a terminal state.
    ///
    /// This is the single aggregating error boundary: every internal
    /// failure is logged and converted to "no outcome" for this worker.
    pub async fn run(self, task: Arc<TaskRequest>, outcome_tx: mpsc::Sender<WorkerOutcome>) {
        let egress = self.egress.label();
        match self.attempt(&task).await {
            Ok(Some(outcome)) => {
                info!(
                    worker = self.id,
                    round = self.round,
                    egress,
                    steps = outcome.steps_taken,
                    "Worker claimed the round"
                );
                if outcome_tx.send(outcome).await.is_err() {
                    warn!(worker = self.id, "Outcome receiver dropped");
                }
            }
            Ok(None) => {}
            Err(e) => {
                metrics::WORKER_ATTEMPTS.with_label_values(&["errored"]).inc();
                warn!(
                    worker = self.id,
                    round = self.round,
                    egress,
                    "Worker errored: {}",
                    e
                );
            }
        }
    }

    async fn attempt(&self, task: &TaskRequest) -> Result<Option<WorkerOutcome>, WorkerError> {
        // INIT: admission before anything else, so capacity bounds the
        // automation sessions and not just the raced futures.
        let _permit = self.ctx.gate.acquire().await;

        // The race may have been decided while this worker waited
        if self.state.is_cancelled() {
            metrics::WORKER_ATTEMPTS
                .with_label_values(&["cancelled"])
                .inc();
            debug!(worker = self.id, "Cancelled before start");
            return Ok(None);
        }

        let session_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let workspace = AttemptWorkspace::create(&self.ctx.config.scan_dir, &session_id)?;

        debug!(
            worker = self.id,
            round = self.round,
            egress = self.egress.label(),
            session_id = session_id.as_str(),
            "Worker starting attempt"
        );

        self.warmup().await;

        let prepared = PreparedTask {
            session_id: session_id.clone(),
            prompt: prepare_prompt(&task.prompt),
            model: task.model.clone(),
            egress: self.egress.clone(),
        };
        let hook = WorkerStepHook {
            worker_id: self.id,
            state: Arc::clone(&self.state),
            captcha: self.ctx.captcha.clone(),
            egress: self.egress.clone(),
            frames_dir: workspace.dir().to_path_buf(),
            pacing_ms: (self.ctx.config.pacing_min_ms, self.ctx.config.pacing_max_ms),
        };

        // RUNNING under the hard wall-clock deadline. The timeout is
        // the only way to stop an engine call that never steps back.
        let deadline = Duration::from_secs(self.ctx.config.worker_timeout_secs);
        let run = tokio::time::timeout(
            deadline,
            self.ctx.engine.run(&prepared, task.max_steps, &hook),
        )
        .await;

        let history = match run {
            Err(_) => {
                metrics::WORKER_ATTEMPTS
                    .with_label_values(&["timed_out"])
                    .inc();
                warn!(
                    worker = self.id,
                    timeout_secs = self.ctx.config.worker_timeout_secs,
                    "Worker timed out, attempt torn down"
                );
                return Ok(None);
            }
            Ok(Err(EngineError::Interrupted)) => {
                metrics::WORKER_ATTEMPTS
                    .with_label_values(&["cancelled"])
                    .inc();
                debug!(worker = self.id, "Cancelled at step boundary");
                return Ok(None);
            }
            Ok(Err(e)) => return Err(WorkerError::Engine(e)),
            Ok(Ok(history)) => history,
        };

        // EXTRACTING: ordered fallback passes over the history
        let Some(raw) = extract_payload(&history) else {
            metrics::WORKER_ATTEMPTS.with_label_values(&["invalid"]).inc();
            debug!(worker = self.id, "No extractable payload");
            return Ok(None);
        };
        let payload = clean_payload(&raw);

        if !self.ctx.validator.is_usable(&payload) {
            metrics::WORKER_ATTEMPTS.with_label_values(&["invalid"]).inc();
            debug!(worker = self.id, "Payload rejected by validator");
            return Ok(None);
        }

        // Winner claim: the round's single point of mutual exclusion
        if !self.state.try_claim().await {
            metrics::WORKER_ATTEMPTS
                .with_label_values(&["cancelled"])
                .inc();
            debug!(
                worker = self.id,
                "Valid result, but another worker claimed first"
            );
            return Ok(None);
        }

        // Artifact assembly runs after the claim so a hosting failure
        // can only degrade the outcome, never lose it.
        let artifact = self.assemble_artifact(&session_id, workspace.dir()).await;

        metrics::WORKER_ATTEMPTS.with_label_values(&["valid"]).inc();
        Ok(Some(WorkerOutcome {
            worker_id: self.id,
            payload,
            steps_taken: history.steps_taken(),
            artifact,
        }))
    }

    /// Prime the egress identity with a few neutral requests before the
    /// real task, reducing first-request suspicion at the target.
    ///
    /// Failures are logged and never abort the attempt. This non-fatal
    /// treatment is a policy choice carried over from production
    /// behavior, not a proven-safe invariant.
    async fn warmup(&self) {
        let urls = &self.ctx.config.warmup_urls;
        if urls.is_empty() {
            return;
        }

        let proxy = match reqwest::Proxy::all(self.egress.proxy_url()) {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!(worker = self.id, "Invalid warmup proxy: {}", e);
                return;
            }
        };
        let client = match reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(worker = self.id, "Failed to build warmup client: {}", e);
                return;
            }
        };

        let requests = urls.iter().map(|url| {
            let client = client.clone();
            async move { (url, client.get(url).send().await) }
        });

        for (url, result) in join_all(requests).await {
            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let exit_ip = response
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|v| v.get("ip").and_then(|ip| ip.as_str()).map(String::from));
                    match exit_ip {
                        Some(ip) => debug!(
                            worker = self.id,
                            url,
                            status,
                            exit_ip = ip,
                            "Warmup request ok"
                        ),
                        None => debug!(worker = self.id, url, status, "Warmup request ok"),
                    }
                }
                Err(e) => debug!(worker = self.id, url, "Warmup request failed: {}", e),
            }
        }
    }

    async fn assemble_artifact(&self, session_id: &str, frames_dir: &Path) -> Option<ArtifactRef> {
        let assembler = self.ctx.assembler.as_ref()?;
        match assembler.assemble(session_id, frames_dir).await {
            Ok(artifact) => {
                metrics::ARTIFACT_ASSEMBLIES.with_label_values(&["ok"]).inc();
                Some(artifact)
            }
            Err(e) => {
                metrics::ARTIFACT_ASSEMBLIES
                    .with_label_values(&["error"])
                    .inc();
                warn!(
                    worker = self.id,
                    session_id, "Artifact assembly failed: {}", e
                );
                None
            }
        }
    }
}
