//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → server stops accepting → drain connections → exit
//!
//! Tasks (tasks.rs):
//!     connection tasks → TaskSet → abort_all() once the grace period ends
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Draining has a deadline: connections still open after it are aborted

pub mod shutdown;
pub mod signals;
pub mod tasks;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use tasks::TaskSet;
