//! Core data types shared by the query and autopilot planes.
//!
//! ## Types Overview
//!
//! ### HostInfo
//! The `(host, port)` pair identifying one application instance. It is the
//! routing token of the query plane and the key of the stub cache, so
//! equality and ordering are structural.
//!
//! ### TopicPartition
//! One partition of one topic. Lag is tracked per `TopicPartition`.
//!
//! ### StoreTypeTag
//! The closed set of store representations a query can target.
//!
//! ### KeyQueryMetadata
//! What the runtime knows about the placement of a key: either the partition
//! is not assigned anywhere yet (transient, during startup or rebalance) or
//! it names the active host plus any standbys.
//!
//! ### ThreadMetadata / TaskMetadata
//! The per-thread task and offset information the runtime reports, from
//! which the autopilot derives consumer lag.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identity of one application instance, as advertised via
/// `application.server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub port: u16,
}

impl HostInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` endpoint string.
    pub fn from_endpoint(endpoint: &str) -> Result<Self, Error> {
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidEndpoint(endpoint.to_string()))?;
        if host.is_empty() {
            return Err(Error::InvalidEndpoint(endpoint.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One partition of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// The store representations a query can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTypeTag {
    KeyValue,
    TimestampedKeyValue,
}

impl fmt::Display for StoreTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTypeTag::KeyValue => write!(f, "key-value"),
            StoreTypeTag::TimestampedKeyValue => write!(f, "timestamped-key-value"),
        }
    }
}

/// Placement of a key's partition, as reported by the runtime.
///
/// `NotAvailable` is transient: the partition exists but is not assigned to
/// any instance right now (cold start, in-flight rebalance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyQueryMetadata {
    NotAvailable,
    Available {
        active: HostInfo,
        standbys: Vec<HostInfo>,
        partition: u32,
    },
}

impl KeyQueryMetadata {
    pub fn active_host(&self) -> Option<&HostInfo> {
        match self {
            KeyQueryMetadata::NotAvailable => None,
            KeyQueryMetadata::Available { active, .. } => Some(active),
        }
    }
}

/// Offsets of one task, keyed by partition. An offset of `-1` means the
/// runtime does not know it yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskMetadata {
    pub task_id: String,
    pub end_offsets: HashMap<TopicPartition, i64>,
    pub committed_offsets: HashMap<TopicPartition, i64>,
}

/// Task assignment of one processing thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadMetadata {
    pub thread_name: String,
    pub active_tasks: Vec<TaskMetadata>,
    pub standby_tasks: Vec<TaskMetadata>,
}

/// Lifecycle states of the underlying runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Created,
    Rebalancing,
    Running,
    PendingShutdown,
    NotRunning,
    Error,
}

impl RuntimeState {
    /// True only in the steady processing state. Everything else means the
    /// topology is in flux and scaling decisions must be suppressed.
    pub fn is_running(self) -> bool {
        matches!(self, RuntimeState::Running)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Created => "CREATED",
            RuntimeState::Rebalancing => "REBALANCING",
            RuntimeState::Running => "RUNNING",
            RuntimeState::PendingShutdown => "PENDING_SHUTDOWN",
            RuntimeState::NotRunning => "NOT_RUNNING",
            RuntimeState::Error => "ERROR",
        };
        f.write_str(name)
    }
}
