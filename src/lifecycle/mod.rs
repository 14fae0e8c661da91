//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging, metrics → Watcher → Listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → broadcast → listeners drain → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
