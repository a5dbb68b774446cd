//! Federated interactive-query plane.
//!
//! A partitioned application keeps each key's state on exactly one instance.
//! This crate lets *any* instance answer a point query for *any* key:
//!
//! ```text
//! caller ──▶ InteractiveQuery ──▶ SerdeRegistry (decode key)
//!                │
//!                ▼
//!            HostManager (route key → owning host)
//!                │
//!        ┌───────┴────────┐
//!        ▼                ▼
//!  LocalKeyValueStore  RemoteStoreStub ──TCP──▶ QueryServer (owning host)
//! ```
//!
//! The wire protocol is a length-prefixed binary frame ([`codec`]); the
//! server side ([`server`]) answers from the instance's own stores through
//! the runtime seam.

pub mod codec;
pub mod error;
pub mod executor;
pub mod host_manager;
pub mod local;
pub mod remote;
pub mod serdes;
pub mod server;
pub mod store;

pub use error::{QueryError, Result};
pub use executor::{InteractiveQuery, QueryRequest};
pub use host_manager::HostManager;
pub use local::LocalKeyValueStore;
pub use remote::RemoteStoreStub;
pub use serdes::{KeySerde, KeyType, SerdeRegistry, TypedKey};
pub use server::QueryServer;
pub use store::{ChannelConfig, ChannelConfigurer, QueryableStore};
