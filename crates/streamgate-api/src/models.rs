//! API models for the management endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The autopilot's observable state.
#[derive(Debug, Serialize, Deserialize)]
pub struct AutopilotStatus {
    pub state: String,
    pub desired_thread_count: usize,
    pub target_thread_count: usize,
    /// Lag per partition, per thread. Partitions render as `topic-partition`.
    pub threads: HashMap<String, HashMap<String, i64>>,
}

/// A successful manual scaling operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadChange {
    pub thread: String,
}

/// The error envelope every management endpoint uses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
