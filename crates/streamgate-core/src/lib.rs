//! Shared foundation for the Streamgate control planes.
//!
//! This crate holds what the query and autopilot planes have in common:
//!
//! - **Types**: host identity, topic partitions, store type tags, and the
//!   metadata shapes the runtime reports (`types`)
//! - **Runtime seam**: the [`StreamRuntime`] trait, the single capability
//!   boundary between Streamgate and the underlying stream-processing
//!   runtime (`runtime`)
//! - **Configuration**: a typed accessor over `key=value` properties with
//!   the recognized Streamgate keys and their defaults (`config`)
//!
//! Everything above this crate talks to the runtime through
//! `Arc<dyn StreamRuntime>`, so tests plug in [`runtime::mock::MockRuntime`]
//! and production wires in an adapter over the real consumer runtime.

pub mod config;
pub mod error;
pub mod runtime;
pub mod types;

pub use config::{AutopilotConfig, Properties};
pub use error::{Error, Result};
pub use runtime::StreamRuntime;
pub use types::{
    HostInfo, KeyQueryMetadata, RuntimeState, StoreTypeTag, TaskMetadata, ThreadMetadata,
    TopicPartition,
};
