//! Mock automation engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::captcha::CaptchaToken;
use crate::engine::{
    AutomationEngine, EngineError, PreparedTask, RunHistory, StepDirective, StepObserver,
    StepRecord,
};

/// Scripted behavior for one engine run.
#[derive(Debug, Clone, Default)]
pub struct EngineBehavior {
    /// Steps replayed to the observer, in order.
    pub steps: Vec<StepRecord>,
    /// Model outputs included in the returned history.
    pub model_outputs: Vec<serde_json::Value>,
    /// Final page text included in the returned history.
    pub final_page_text: Option<String>,
    /// Delay before the first step.
    pub start_delay: Duration,
    /// Delay before every step.
    pub step_delay: Duration,
    /// Never call the observer and never return; only the worker's
    /// outer timeout can tear the run down.
    pub hang: bool,
    /// Fail the run immediately with this message.
    pub error: Option<String>,
}

impl EngineBehavior {
    /// A run that completes with a done-step carrying `content`.
    pub fn done_with(content: &str) -> Self {
        Self {
            steps: vec![
                super::fixtures::action_step(1, "Navigated to listing"),
                super::fixtures::done_step(2, content),
            ],
            ..Default::default()
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// A run that hangs forever without stepping.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    /// A run that fails immediately.
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Tracks concurrent runs and the high-water mark.
struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize, max_active: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the AutomationEngine trait.
///
/// Behaviors are keyed by egress host, so racing workers on different
/// proxies can be scripted independently; unkeyed hosts fall back to the
/// default behavior. Records run counts, interruptions, injected CAPTCHA
/// tokens, and the maximum number of concurrently active runs (for gate
/// capacity assertions).
pub struct MockEngine {
    default_behavior: RwLock<EngineBehavior>,
    behaviors: RwLock<HashMap<String, EngineBehavior>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    interrupted: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    injected_tokens: RwLock<Vec<CaptchaToken>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine whose default behavior produces no content.
    pub fn new() -> Self {
        Self {
            default_behavior: RwLock::new(EngineBehavior::default()),
            behaviors: RwLock::new(HashMap::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            interrupted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            injected_tokens: RwLock::new(Vec::new()),
        }
    }

    /// Set the behavior for runs on any egress host without its own.
    pub async fn set_default_behavior(&self, behavior: EngineBehavior) {
        *self.default_behavior.write().await = behavior;
    }

    /// Set the behavior for runs bound to the given egress host.
    pub async fn set_behavior(&self, host: &str, behavior: EngineBehavior) {
        self.behaviors.write().await.insert(host.to_string(), behavior);
    }

    /// Runs started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Runs that completed and returned a history.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Runs interrupted by the observer.
    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently active runs observed.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// CAPTCHA tokens handed back by observers for injection.
    pub async fn injected_tokens(&self) -> Vec<CaptchaToken> {
        self.injected_tokens.read().await.clone()
    }
}

#[async_trait]
impl AutomationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        task: &PreparedTask,
        budget: u32,
        observer: &dyn StepObserver,
    ) -> Result<RunHistory, EngineError> {
        self.started.fetch_add(1, Ordering::SeqCst);

        let behavior = {
            let behaviors = self.behaviors.read().await;
            match behaviors.get(&task.egress.host) {
                Some(behavior) => behavior.clone(),
                None => self.default_behavior.read().await.clone(),
            }
        };

        let _active = ActiveGuard::enter(&self.active, &self.max_active);

        if let Some(message) = behavior.error {
            return Err(EngineError::ApiError(message));
        }

        if behavior.hang {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        tokio::time::sleep(behavior.start_delay).await;

        let mut history = RunHistory {
            steps: Vec::new(),
            model_outputs: behavior.model_outputs,
            final_page_text: behavior.final_page_text,
        };

        for step in behavior.steps.into_iter().take(budget as usize) {
            tokio::time::sleep(behavior.step_delay).await;

            match observer.on_step(&step).await {
                Ok(StepDirective::Continue) => {}
                Ok(StepDirective::InjectCaptchaToken(token)) => {
                    self.injected_tokens.write().await.push(token);
                }
                Err(_) => {
                    self.interrupted.fetch_add(1, Ordering::SeqCst);
                    return Err(EngineError::Interrupted);
                }
            }

            let done = step.is_done;
            history.steps.push(step);
            if done {
                break;
            }
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    struct ContinueObserver;

    #[async_trait]
    impl StepObserver for ContinueObserver {
        async fn on_step(
            &self,
            _step: &StepRecord,
        ) -> Result<StepDirective, crate::engine::StepInterrupt> {
            Ok(StepDirective::Continue)
        }
    }

    fn prepared(host: &str) -> PreparedTask {
        PreparedTask {
            session_id: "test1234".to_string(),
            prompt: "prompt".to_string(),
            model: "gpt-5.1".to_string(),
            egress: fixtures::egress(host),
        }
    }

    #[tokio::test]
    async fn test_scripted_run() {
        let engine = MockEngine::new();
        engine
            .set_behavior("p1", EngineBehavior::done_with("result"))
            .await;

        let history = engine
            .run(&prepared("p1"), 10, &ContinueObserver)
            .await
            .unwrap();

        assert_eq!(history.steps.len(), 2);
        assert!(history.steps[1].is_done);
        assert_eq!(engine.started(), 1);
        assert_eq!(engine.completed(), 1);
    }

    #[tokio::test]
    async fn test_budget_truncates_steps() {
        let engine = MockEngine::new();
        engine
            .set_default_behavior(EngineBehavior {
                steps: (1..=10).map(|i| fixtures::action_step(i, "Clicked")).collect(),
                ..Default::default()
            })
            .await;

        let history = engine
            .run(&prepared("any"), 4, &ContinueObserver)
            .await
            .unwrap();

        assert_eq!(history.steps.len(), 4);
    }

    #[tokio::test]
    async fn test_observer_interrupt_stops_run() {
        struct InterruptAfterFirst(AtomicUsize);

        #[async_trait]
        impl StepObserver for InterruptAfterFirst {
            async fn on_step(
                &self,
                _step: &StepRecord,
            ) -> Result<StepDirective, crate::engine::StepInterrupt> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(StepDirective::Continue)
                } else {
                    Err(crate::engine::StepInterrupt)
                }
            }
        }

        let engine = MockEngine::new();
        engine
            .set_default_behavior(EngineBehavior {
                steps: (1..=5).map(|i| fixtures::action_step(i, "Clicked")).collect(),
                ..Default::default()
            })
            .await;

        let result = engine
            .run(&prepared("any"), 10, &InterruptAfterFirst(AtomicUsize::new(0)))
            .await;

        assert!(matches!(result, Err(EngineError::Interrupted)));
        assert_eq!(engine.interrupted(), 1);
        assert_eq!(engine.completed(), 0);
    }
}
