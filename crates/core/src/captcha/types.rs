//! Types for CAPTCHA detection and solving.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::egress::EgressDescriptor;

/// Challenge family detected on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Turnstile,
    RecaptchaV2,
    HCaptcha,
}

impl ChallengeKind {
    /// String representation for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Turnstile => "turnstile",
            ChallengeKind::RecaptchaV2 => "recaptcha_v2",
            ChallengeKind::HCaptcha => "hcaptcha",
        }
    }

    /// Proxyless task type for the solving service.
    pub(crate) fn task_type(&self) -> &'static str {
        match self {
            ChallengeKind::Turnstile => "AntiTurnstileTaskProxyLess",
            ChallengeKind::RecaptchaV2 => "ReCaptchaV2TaskProxyLess",
            ChallengeKind::HCaptcha => "HCaptchaTaskProxyLess",
        }
    }

    /// Field carrying the token in the service's solution object.
    pub(crate) fn solution_field(&self) -> &'static str {
        match self {
            ChallengeKind::Turnstile => "token",
            ChallengeKind::RecaptchaV2 | ChallengeKind::HCaptcha => "gRecaptchaResponse",
        }
    }
}

/// A challenge descriptor handed to the solving service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub kind: ChallengeKind,
    pub site_key: String,
    pub page_url: String,
}

/// A solved token, ready for injection by the automation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaToken {
    pub kind: ChallengeKind,
    pub token: String,
}

/// Errors that can occur talking to the solving service.
///
/// Service-reported failures (task rejected, solve failed, poll budget
/// exhausted) are NOT errors — they surface as `Ok(None)` from `solve`.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("Solver connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Solver API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for CAPTCHA solving backends.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Solve a challenge, optionally binding the solve to an egress
    /// identity so the token's origin matches the browsing session.
    ///
    /// Returns `Ok(None)` when the service cannot produce a token.
    async fn solve(
        &self,
        challenge: &Challenge,
        egress: Option<&EgressDescriptor>,
    ) -> Result<Option<CaptchaToken>, CaptchaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_strips_to_proxied_variant() {
        // Proxied variants are the proxyless name minus the suffix
        for kind in [
            ChallengeKind::Turnstile,
            ChallengeKind::RecaptchaV2,
            ChallengeKind::HCaptcha,
        ] {
            assert!(kind.task_type().ends_with("ProxyLess"));
        }
    }

    #[test]
    fn test_solution_field_by_kind() {
        assert_eq!(ChallengeKind::Turnstile.solution_field(), "token");
        assert_eq!(
            ChallengeKind::RecaptchaV2.solution_field(),
            "gRecaptchaResponse"
        );
    }
}
