//! Egress identity pool.
//!
//! This module provides the `EgressProvider` trait for fetching network
//! exit points from an external pool service, and the `EgressPool` that
//! holds the live list behind a single-writer refresh lock. Race rounds
//! only ever read immutable snapshots of the pool.

mod pool;
mod provider;
mod types;

pub use pool::EgressPool;
pub use provider::HttpEgressProvider;
pub use types::*;
