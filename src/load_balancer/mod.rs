//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → balancer name identified
//!     → pool.rs (look up the WorkerPool)
//!     → policy.rs (walk lbsets, regular then standby workers)
//!         → selector.rs (least busy usable worker of one lbset)
//!             → health::gate (errored workers: wait or probe)
//!     → worker.rs (BusyGuard held while the request is forwarded)
//!     → Return worker or None (503)
//! ```
//!
//! # Design Decisions
//! - One policy: fewest active requests, ties broken by fairness credit
//! - Priority tiers (`lbset`) and standby workers give explicit failover order
//! - Worker counters are atomics shared by all in-flight selections
//! - Errored workers are probed inline, on the request path

pub mod policy;
pub mod pool;
pub mod selector;
pub mod worker;

pub use policy::{BalancerPolicy, SelectContext};
pub use pool::{BalancerRegistry, WorkerPool};
pub use worker::{BusyGuard, Worker};
