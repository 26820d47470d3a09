//! CAPTCHA and bot-wall handling.
//!
//! Detection is pure (`detect`): it scans a page snapshot for Cloudflare
//! Turnstile, reCAPTCHA v2, hCaptcha, and Cloudflare JS walls. Solving is
//! delegated to an external service behind the `CaptchaSolver` trait; the
//! bundled implementation speaks the CapSolver create-then-poll protocol.

mod capsolver;
mod detect;
mod types;

pub use capsolver::CapSolverClient;
pub use detect::{detect_challenge, is_js_wall};
pub use types::*;
