//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (http::server):
//!     Forwarding to a worker fails
//!     → worker marked IN_ERROR, error clock restarted
//!
//! Recovery (gate.rs), during selection:
//!     Worker in error and its retry interval has passed
//!     → probe.rs sends HEAD to the worker
//!     → healthy: error bit cleared, retries += 1
//!     → unhealthy: stays in error, clock restarted
//! ```
//!
//! # Design Decisions
//! - No background checker: only workers that failed get probed, and only
//!   when a request would otherwise consider them
//! - The retry interval bounds how often a dead backend is probed
//! - Healthy status codes are a configurable mode (lenient by default)

pub mod gate;
pub mod probe;

pub use gate::FailureGate;
pub use probe::{HeadProbe, ProbeError, ProbeMode, ProbeResult, Prober};
