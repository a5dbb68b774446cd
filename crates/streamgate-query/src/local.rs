//! Local store adapter.
//!
//! Presents the instance's own state stores behind the same
//! [`QueryableStore`] contract as a remote stub, completing synchronously
//! from the runtime's store handle. Its `stub(host)` is where the
//! local/remote split happens: asked for itself it stays local, asked for
//! any other host it hands out a [`RemoteStoreStub`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use streamgate_core::{HostInfo, Properties, StoreTypeTag, StreamRuntime};

use crate::error::{QueryError, Result};
use crate::remote::RemoteStoreStub;
use crate::store::{ChannelConfig, QueryableStore};

pub(crate) const LOCAL_STORE_REFERENCE: &str = "local-key-value-store";

/// The instance's own key/value stores, addressable by its advertised
/// `application.server` endpoint.
///
/// Construction fails with [`QueryError::MissingSelfEndpoint`] when that
/// endpoint is not configured: without it this instance cannot participate
/// in federated routing at all.
#[derive(Debug)]
pub struct LocalKeyValueStore {
    runtime: Arc<dyn StreamRuntime>,
    self_host: HostInfo,
}

impl LocalKeyValueStore {
    pub fn new(runtime: Arc<dyn StreamRuntime>, properties: &Properties) -> Result<Self> {
        let self_host = properties
            .application_server()
            .map_err(QueryError::from)?
            .ok_or(QueryError::MissingSelfEndpoint)?;
        Ok(Self { runtime, self_host })
    }

    pub fn self_host(&self) -> &HostInfo {
        &self.self_host
    }
}

#[async_trait]
impl QueryableStore for LocalKeyValueStore {
    fn reference(&self) -> &str {
        LOCAL_STORE_REFERENCE
    }

    fn is_compatible(&self, tag: StoreTypeTag) -> bool {
        matches!(
            tag,
            StoreTypeTag::KeyValue | StoreTypeTag::TimestampedKeyValue
        )
    }

    fn stub(&self, host: HostInfo) -> Arc<dyn QueryableStore> {
        if host == self.self_host {
            Arc::new(LocalKeyValueStore {
                runtime: Arc::clone(&self.runtime),
                self_host: self.self_host.clone(),
            })
        } else {
            Arc::new(RemoteStoreStub::new(host))
        }
    }

    async fn configure(&self, _config: &ChannelConfig) {}

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) {}

    async fn find_by_key(&self, key: &[u8], store_name: &str) -> Result<Option<Bytes>> {
        self.runtime
            .local_get(store_name, key)
            .await
            .map_err(QueryError::from)
    }
}
