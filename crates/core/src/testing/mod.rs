//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external collaborator
//! traits, allowing full race-lifecycle testing without a browser driver,
//! solving service, proxy pool, or artifact host.

mod mock_assembler;
mod mock_captcha;
mod mock_egress;
mod mock_engine;

pub use mock_assembler::MockArtifactAssembler;
pub use mock_captcha::MockCaptchaSolver;
pub use mock_egress::MockEgressProvider;
pub use mock_engine::{EngineBehavior, MockEngine};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::egress::EgressDescriptor;
    use crate::engine::{PageSnapshot, StepRecord};
    use crate::race::TaskRequest;

    /// An egress descriptor with placeholder credentials.
    pub fn egress(host: &str) -> EgressDescriptor {
        EgressDescriptor {
            host: host.to_string(),
            port: 5470,
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    /// A task request with test defaults.
    pub fn task(prompt: &str) -> TaskRequest {
        TaskRequest {
            prompt: prompt.to_string(),
            max_steps: 20,
            model: "gpt-5.1".to_string(),
        }
    }

    /// A step that only echoes an action.
    pub fn action_step(index: u32, action: &str) -> StepRecord {
        StepRecord {
            index,
            action: action.to_string(),
            extracted_content: Some(action.to_string()),
            is_done: false,
            screenshot_b64: None,
            page: None,
        }
    }

    /// A step carrying extracted content.
    pub fn content_step(index: u32, content: &str) -> StepRecord {
        StepRecord {
            index,
            action: "Extracted content".to_string(),
            extracted_content: Some(content.to_string()),
            is_done: false,
            screenshot_b64: None,
            page: None,
        }
    }

    /// A completing step carrying the final content.
    pub fn done_step(index: u32, content: &str) -> StepRecord {
        StepRecord {
            index,
            action: "Done".to_string(),
            extracted_content: Some(content.to_string()),
            is_done: true,
            screenshot_b64: None,
            page: None,
        }
    }

    /// A step whose page snapshot carries the given HTML.
    pub fn page_step(index: u32, url: &str, html: &str) -> StepRecord {
        StepRecord {
            index,
            action: "Navigated".to_string(),
            extracted_content: None,
            is_done: false,
            screenshot_b64: None,
            page: Some(PageSnapshot {
                url: url.to_string(),
                html: html.to_string(),
                frame_urls: vec![],
            }),
        }
    }

    /// A JSON list of records that passes the default validator.
    pub fn record_list(n: usize) -> String {
        let rows: Vec<String> = (0..n)
            .map(|i| {
                format!(
                    r#"{{"title": "Notice {}", "url": "https://example.com/{}", "date": "2024-01-0{}"}}"#,
                    i,
                    i,
                    (i % 9) + 1
                )
            })
            .collect();
        format!("[{}]", rows.join(", "))
    }
}
