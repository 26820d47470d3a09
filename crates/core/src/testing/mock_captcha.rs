//! Mock CAPTCHA solver for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::captcha::{CaptchaError, CaptchaSolver, CaptchaToken, Challenge};
use crate::egress::EgressDescriptor;

/// Mock implementation of the CaptchaSolver trait.
///
/// Returns a configurable token (or none) and records every challenge
/// it was asked to solve.
pub struct MockCaptchaSolver {
    token: RwLock<Option<String>>,
    challenges: RwLock<Vec<Challenge>>,
    fail: AtomicBool,
}

impl Default for MockCaptchaSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptchaSolver {
    /// Create a solver that answers every challenge with a fixed token.
    pub fn new() -> Self {
        Self {
            token: RwLock::new(Some("mock-captcha-token".to_string())),
            challenges: RwLock::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Set the token returned for subsequent solves (`None` = unsolved).
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Make subsequent solves fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Challenges received so far.
    pub async fn recorded_challenges(&self) -> Vec<Challenge> {
        self.challenges.read().await.clone()
    }

    /// Number of solve calls.
    pub async fn solve_count(&self) -> usize {
        self.challenges.read().await.len()
    }
}

#[async_trait]
impl CaptchaSolver for MockCaptchaSolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn solve(
        &self,
        challenge: &Challenge,
        _egress: Option<&EgressDescriptor>,
    ) -> Result<Option<CaptchaToken>, CaptchaError> {
        self.challenges.write().await.push(challenge.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptchaError::ConnectionFailed("mock failure".to_string()));
        }

        Ok(self.token.read().await.clone().map(|token| CaptchaToken {
            kind: challenge.kind,
            token,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::ChallengeKind;

    fn challenge() -> Challenge {
        Challenge {
            kind: ChallengeKind::Turnstile,
            site_key: "0x4AAAAkey".to_string(),
            page_url: "https://example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_solve_returns_token_and_records() {
        let solver = MockCaptchaSolver::new();
        let token = solver.solve(&challenge(), None).await.unwrap().unwrap();
        assert_eq!(token.token, "mock-captcha-token");
        assert_eq!(token.kind, ChallengeKind::Turnstile);
        assert_eq!(solver.solve_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsolved_configuration() {
        let solver = MockCaptchaSolver::new();
        solver.set_token(None).await;
        assert!(solver.solve(&challenge(), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let solver = MockCaptchaSolver::new();
        solver.set_fail(true);
        assert!(solver.solve(&challenge(), None).await.is_err());
    }
}
