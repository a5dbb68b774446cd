//! Autopilot: lag-driven elastic scaling of stream processing threads.
//!
//! A scheduled tick gathers per-thread consumer lag from the runtime,
//! decides whether the current thread count can keep up, and adds or
//! removes threads within `desired ..= desired + limit`. A state machine
//! encodes what the autopilot is doing — including "a mutating operation is
//! in flight", so concurrent ticks and manual calls cannot compound.
//!
//! Scaling decisions are suppressed while the [recovery
//! window](recovery::RecoveryWindowManager) is open: during a rebalance (and
//! for a grace period after it) lag numbers describe the *old* topology, and
//! acting on them would fight the runtime's own reassignment.

pub mod autopilot;
pub mod error;
pub mod recovery;
pub mod state;

pub use autopilot::Autopilot;
pub use error::{AutopilotError, Result};
pub use recovery::RecoveryWindowManager;
pub use state::State;
