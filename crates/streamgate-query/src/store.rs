//! The queryable-store contract shared by local and remote representations.
//!
//! A store is *queryable* regardless of where its partition lives: the local
//! adapter answers from the runtime's own store handle, the remote stub
//! answers over the wire. The host manager only ever sees this trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use streamgate_core::{HostInfo, StoreTypeTag};

use crate::error::Result;

/// Transport channel settings, applied to a stub once, before
/// `initialize()`.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_frame_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}

/// Hook for adjusting the channel configuration of every stub the host
/// manager creates. Configurers run in registration order.
pub trait ChannelConfigurer: Send + Sync {
    fn configure(&self, config: &mut ChannelConfig);
}

/// A state store that can answer point reads, local or remote.
///
/// Lifecycle: `configure` (once, before `initialize`) → `initialize`
/// (establishes the transport) → queries → `shutdown` (releases the
/// channel). A stub that has not been initialized must not be queried.
#[async_trait]
pub trait QueryableStore: Send + Sync {
    /// Stable identifier, globally unique across an application.
    fn reference(&self) -> &str;

    /// Whether this store representation can serve the given type tag.
    fn is_compatible(&self, tag: StoreTypeTag) -> bool;

    /// Produce a client bound to `host`. The host manager's cache is the
    /// caller; it guarantees at most one live stub per host.
    fn stub(&self, host: HostInfo) -> Arc<dyn QueryableStore>;

    async fn configure(&self, config: &ChannelConfig);

    async fn initialize(&self) -> Result<()>;

    async fn shutdown(&self);

    /// Point read. `Ok(Some)` when the owning host replies with a value,
    /// `Ok(None)` when it confirms absence.
    async fn find_by_key(&self, key: &[u8], store_name: &str) -> Result<Option<Bytes>>;
}

impl std::fmt::Debug for dyn QueryableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("QueryableStore").field(&self.reference()).finish()
    }
}
