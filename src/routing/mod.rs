//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup, highest priority first)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Route (balancer name) or no match (404)
//! ```

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
