//! Prometheus metrics endpoint support.
//!
//! The server exposes every core metric plus its own HTTP counters on a
//! dedicated registry, text-encoded at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    harrier_core::metrics::register_metrics(&registry);
    let _ = registry.register(Box::new(AGENT_REQUESTS.clone()));
    registry
});

/// Agent run requests by result ("completed", "empty").
pub static AGENT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harrier_agent_requests_total", "Agent run requests"),
        &["result"],
    )
    .unwrap()
});

/// Text-encode the registry for the /metrics route.
pub fn encode() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_core_metrics() {
        AGENT_REQUESTS.with_label_values(&["completed"]).inc();
        let text = encode();
        assert!(text.contains("harrier_agent_requests_total"));
    }
}
