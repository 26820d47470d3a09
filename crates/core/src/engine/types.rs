//! Types for the automation engine boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::captcha::CaptchaToken;
use crate::egress::EgressDescriptor;

/// Snapshot of the page at a step boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Current page URL.
    #[serde(default)]
    pub url: String,
    /// Document HTML (possibly truncated by the driver).
    #[serde(default)]
    pub html: String,
    /// URLs of all frames on the page.
    #[serde(default)]
    pub frame_urls: Vec<String>,
}

/// One automation step as reported by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based step index.
    pub index: u32,
    /// Action label (e.g., "Clicked element #submit").
    #[serde(default)]
    pub action: String,
    /// Content extracted by this step, if any.
    #[serde(default)]
    pub extracted_content: Option<String>,
    /// Whether this step completed the task.
    #[serde(default)]
    pub is_done: bool,
    /// Base64 screenshot taken after the step.
    #[serde(default)]
    pub screenshot_b64: Option<String>,
    /// Page snapshot at the step boundary.
    #[serde(default)]
    pub page: Option<PageSnapshot>,
}

/// Full execution history returned by the engine.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    /// All completed steps in order.
    pub steps: Vec<StepRecord>,
    /// Raw model outputs per step, newest last.
    pub model_outputs: Vec<serde_json::Value>,
    /// Text content of the final page, for last-resort extraction.
    pub final_page_text: Option<String>,
}

impl RunHistory {
    /// Number of steps the engine completed.
    pub fn steps_taken(&self) -> u32 {
        self.steps.len() as u32
    }
}

/// Task handed to the engine, already wrapped with operator rules and
/// bound to one egress identity.
#[derive(Debug, Clone)]
pub struct PreparedTask {
    pub session_id: String,
    pub prompt: String,
    pub model: String,
    pub egress: EgressDescriptor,
}

/// Raised by a `StepObserver` to abort the run at a step boundary.
#[derive(Debug, Clone, Copy, Error)]
#[error("attempt cancelled at step boundary")]
pub struct StepInterrupt;

/// Instruction returned by the observer for the engine's next step.
#[derive(Debug, Clone)]
pub enum StepDirective {
    /// Proceed normally.
    Continue,
    /// Inject a solved CAPTCHA token before the next step.
    InjectCaptchaToken(CaptchaToken),
}

/// Per-step callback invoked by the engine after every automation step.
///
/// This is the only cooperative cancellation checkpoint a worker controls:
/// an engine implementation that stops calling back can only be stopped by
/// the worker's outer wall-clock timeout.
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn on_step(&self, step: &StepRecord) -> Result<StepDirective, StepInterrupt>;
}

/// Errors that can occur during an engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Engine API error: {0}")]
    ApiError(String),

    #[error("Engine rejected session: {0}")]
    SessionRejected(String),

    #[error("Run interrupted at step boundary")]
    Interrupted,

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for automation engine backends.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Execute the task, invoking `observer` once per step, until the
    /// engine signals completion or `budget` steps have run.
    async fn run(
        &self,
        task: &PreparedTask,
        budget: u32,
        observer: &dyn StepObserver,
    ) -> Result<RunHistory, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_record_deserialization_defaults() {
        let json = r#"{"index": 3}"#;
        let step: StepRecord = serde_json::from_str(json).unwrap();
        assert_eq!(step.index, 3);
        assert!(!step.is_done);
        assert!(step.extracted_content.is_none());
        assert!(step.page.is_none());
    }

    #[test]
    fn test_run_history_steps_taken() {
        let history = RunHistory {
            steps: vec![StepRecord::default(), StepRecord::default()],
            model_outputs: vec![],
            final_page_text: None,
        };
        assert_eq!(history.steps_taken(), 2);
    }
}
