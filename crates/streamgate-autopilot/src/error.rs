use std::time::Duration;

use thiserror::Error;

use crate::state::State;

/// Result type for autopilot operations
pub type Result<T> = std::result::Result<T, AutopilotError>;

/// Autopilot errors
#[derive(Debug, Error)]
pub enum AutopilotError {
    #[error("cannot transition from [{from}] to [{to}]")]
    InvalidTransition { from: State, to: State },

    #[error("could not acquire the state lock, is someone else holding it?")]
    LockUnavailable,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("recovery window is open")]
    WindowOpen,

    #[error("autopilot cannot perform its run without a window manager")]
    MissingWindowManager,

    #[error("the runtime could not comply with the thread change")]
    ThreadUnavailable,

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<streamgate_core::Error> for AutopilotError {
    fn from(err: streamgate_core::Error) -> Self {
        AutopilotError::Runtime(err.to_string())
    }
}
