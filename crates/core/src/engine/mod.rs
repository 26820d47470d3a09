//! Automation engine boundary.
//!
//! The engine drives a browser step-by-step from natural language; harrier
//! does not implement it. This module defines the `AutomationEngine` trait,
//! the per-step `StepObserver` callback (the race's only cooperative
//! cancellation checkpoint), and a `RemoteEngine` client for a step-wise
//! HTTP driver. Prompt preparation lives in `prompt`.

mod prompt;
mod remote;
mod types;

pub use prompt::{prepare_prompt, repair_url_typos};
pub use remote::RemoteEngine;
pub use types::*;
