//! Artifact assembly boundary.
//!
//! A winning attempt hands its ordered screenshot frames to an external
//! assembly/hosting service and reports the resulting reference alongside
//! the payload. Assembly failure degrades the outcome (no artifact) but
//! never invalidates an already-claimed result.

mod hosted;
mod types;

pub use hosted::HostedAssembler;
pub use types::*;
