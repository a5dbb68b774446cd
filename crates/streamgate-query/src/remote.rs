//! Client side of the query transport.
//!
//! One stub per remote host, one framed TCP connection per stub. The host
//! manager guarantees the one-stub-per-host part; the stub serializes its
//! own request/reply cycles behind a connection lock, which is plenty for a
//! point-read path (this is a diagnostic surface, not a throughput path).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::debug;

use streamgate_core::{HostInfo, StoreTypeTag};

use crate::codec::{QueryCodec, QueryRequestFrame, QueryResponseFrame};
use crate::error::{QueryError, Result};
use crate::store::{ChannelConfig, QueryableStore};

pub(crate) const REMOTE_STORE_REFERENCE: &str = "remote-key-value-store";

type Connection = Framed<TcpStream, QueryCodec>;

/// A remote store bound to one host.
pub struct RemoteStoreStub {
    host: HostInfo,
    config: Mutex<ChannelConfig>,
    connection: Mutex<Option<Connection>>,
}

impl RemoteStoreStub {
    pub fn new(host: HostInfo) -> Self {
        Self {
            host,
            config: Mutex::new(ChannelConfig::default()),
            connection: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }
}

#[async_trait]
impl QueryableStore for RemoteStoreStub {
    fn reference(&self) -> &str {
        REMOTE_STORE_REFERENCE
    }

    fn is_compatible(&self, tag: StoreTypeTag) -> bool {
        matches!(
            tag,
            StoreTypeTag::KeyValue | StoreTypeTag::TimestampedKeyValue
        )
    }

    fn stub(&self, host: HostInfo) -> Arc<dyn QueryableStore> {
        Arc::new(RemoteStoreStub::new(host))
    }

    async fn configure(&self, config: &ChannelConfig) {
        *self.config.lock().await = config.clone();
    }

    async fn initialize(&self) -> Result<()> {
        let config = self.config.lock().await.clone();
        let endpoint = self.host.to_string();

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| QueryError::Timeout(config.connect_timeout))?
            .map_err(|e| QueryError::Transport(format!("connect to {}: {}", endpoint, e)))?;

        let codec = QueryCodec::with_max_frame_size(config.max_frame_size);
        *self.connection.lock().await = Some(Framed::new(stream, codec));

        debug!(host = %self.host, "remote store stub initialized");
        Ok(())
    }

    async fn shutdown(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!(host = %self.host, "remote store stub shut down");
        }
    }

    async fn find_by_key(&self, key: &[u8], store_name: &str) -> Result<Option<Bytes>> {
        let request_timeout = self.config.lock().await.request_timeout;

        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or_else(|| {
            QueryError::Transport(format!("stub for {} is not initialized", self.host))
        })?;

        let frame = QueryRequestFrame::new(store_name, Bytes::copy_from_slice(key));
        connection
            .send(frame.encode())
            .await
            .map_err(|e| QueryError::Transport(format!("send to {}: {}", self.host, e)))?;

        let reply = tokio::time::timeout(request_timeout, connection.next())
            .await
            .map_err(|_| QueryError::Timeout(request_timeout))?;

        let mut payload = match reply {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(QueryError::Transport(format!(
                    "connection to {} closed",
                    self.host
                )))
            }
        };

        match QueryResponseFrame::parse(&mut payload)? {
            QueryResponseFrame::Found(value) => Ok(Some(value)),
            QueryResponseFrame::Empty => Ok(None),
            QueryResponseFrame::Error { code, message } => Err(code.into_error(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_before_initialize_is_a_transport_error() {
        let stub = RemoteStoreStub::new(HostInfo::new("localhost", 19099));
        let err = stub.find_by_key(b"key", "store").await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_initialize_against_dead_host_fails() {
        let stub = RemoteStoreStub::new(HostInfo::new("127.0.0.1", 1));
        let err = stub.initialize().await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Transport(_) | QueryError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let stub = RemoteStoreStub::new(HostInfo::new("localhost", 19099));
        stub.shutdown().await;
        stub.shutdown().await;
    }

    #[test]
    fn test_compatibility() {
        let stub = RemoteStoreStub::new(HostInfo::new("localhost", 19099));
        assert!(stub.is_compatible(StoreTypeTag::KeyValue));
        assert!(stub.is_compatible(StoreTypeTag::TimestampedKeyValue));
    }
}
