//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Race rounds and worker attempt outcomes
//! - Session gate occupancy
//! - External services (CAPTCHA solver, egress provider, artifact host)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

/// Round outcomes by result ("claimed", "failed").
pub static ROUND_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harrier_round_outcomes_total", "Race round outcomes"),
        &["result"],
    )
    .unwrap()
});

/// Round duration in seconds.
pub static ROUND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("harrier_round_duration_seconds", "Duration of race rounds")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Worker attempts by terminal state
/// ("valid", "invalid", "timed_out", "cancelled", "errored").
pub static WORKER_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "harrier_worker_attempts_total",
            "Worker attempts by terminal state",
        ),
        &["outcome"],
    )
    .unwrap()
});

/// Automation sessions currently holding a gate slot.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harrier_active_sessions",
        "Automation sessions currently admitted by the gate",
    )
    .unwrap()
});

/// CAPTCHA challenges by kind and result ("solved", "unsolved", "error").
pub static CAPTCHA_CHALLENGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "harrier_captcha_challenges_total",
            "CAPTCHA challenges encountered",
        ),
        &["kind", "result"],
    )
    .unwrap()
});

/// Egress pool refreshes by result ("ok", "empty", "error").
pub static EGRESS_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harrier_egress_refreshes_total", "Egress pool refreshes"),
        &["result"],
    )
    .unwrap()
});

/// Artifact assemblies by result ("ok", "error").
pub static ARTIFACT_ASSEMBLIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harrier_artifact_assemblies_total", "Artifact assemblies"),
        &["result"],
    )
    .unwrap()
});

/// Register all core metrics into the given registry.
pub fn register_metrics(registry: &Registry) {
    let _ = registry.register(Box::new(ROUND_OUTCOMES.clone()));
    let _ = registry.register(Box::new(ROUND_DURATION.clone()));
    let _ = registry.register(Box::new(WORKER_ATTEMPTS.clone()));
    let _ = registry.register(Box::new(ACTIVE_SESSIONS.clone()));
    let _ = registry.register(Box::new(CAPTCHA_CHALLENGES.clone()));
    let _ = registry.register(Box::new(EGRESS_REFRESHES.clone()));
    let _ = registry.register(Box::new(ARTIFACT_ASSEMBLIES.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        assert!(!registry.gather().is_empty());
    }
}
