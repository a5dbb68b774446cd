//! Query protocol server
//!
//! TCP server that answers point-read requests from peer instances. Each
//! connection is one spawned task; frames are decoded with [`QueryCodec`]
//! and answered from the instance's own stores through the runtime seam.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use streamgate_core::StreamRuntime;

use crate::codec::{QueryCodec, QueryRequestFrame, QueryResponseFrame};
use crate::error::{QueryError, Result, WireErrorCode};

/// Query protocol server
pub struct QueryServer {
    runtime: Arc<dyn StreamRuntime>,
}

impl QueryServer {
    pub fn new(runtime: Arc<dyn StreamRuntime>) -> Self {
        Self { runtime }
    }

    /// Bind the listener. Binding is separate from serving so callers can
    /// learn the local address before the accept loop starts (ephemeral
    /// ports in tests, advertised endpoints in production).
    pub async fn bind(self, bind_addr: &str) -> Result<BoundQueryServer> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("query server listening on {}", local_addr);
        Ok(BoundQueryServer {
            listener,
            local_addr,
            runtime: self.runtime,
        })
    }
}

/// A bound query server, ready to serve.
pub struct BoundQueryServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    runtime: Arc<dyn StreamRuntime>,
}

impl BoundQueryServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop until the shutdown signal is received.
    pub async fn run_until(self, shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let runtime = Arc::clone(&self.runtime);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, runtime).await {
                                    warn!("connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("query server on {} shutting down", self.local_addr);
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    runtime: Arc<dyn StreamRuntime>,
) -> Result<()> {
    debug!("accepted query connection from {}", addr);
    let mut framed = Framed::new(stream, QueryCodec::new());

    while let Some(frame) = framed.next().await {
        let mut payload = frame?;
        let response = match QueryRequestFrame::parse(&mut payload) {
            Ok(request) => serve_request(&runtime, &request).await,
            Err(e) => QueryResponseFrame::Error {
                code: WireErrorCode::from(&e),
                message: e.to_string(),
            },
        };
        framed.send(response.encode()).await?;
    }

    debug!("query connection from {} closed", addr);
    Ok(())
}

async fn serve_request(
    runtime: &Arc<dyn StreamRuntime>,
    request: &QueryRequestFrame,
) -> QueryResponseFrame {
    match runtime.local_get(&request.store_name, &request.key).await {
        Ok(Some(value)) => QueryResponseFrame::Found(value),
        Ok(None) => QueryResponseFrame::Empty,
        Err(e) => {
            let err = QueryError::from(e);
            debug!(store = %request.store_name, error = %err, "local read failed");
            QueryResponseFrame::Error {
                code: WireErrorCode::from(&err),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use streamgate_core::runtime::mock::MockRuntime;
    use streamgate_core::{HostInfo, StoreTypeTag};

    use crate::remote::RemoteStoreStub;
    use crate::store::QueryableStore;

    async fn spawn_server(runtime: Arc<MockRuntime>) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let server = QueryServer::new(runtime).bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            server.run_until(rx).await.unwrap();
        });
        (addr, tx)
    }

    fn stub_for(addr: SocketAddr) -> RemoteStoreStub {
        RemoteStoreStub::new(HostInfo::new(addr.ip().to_string(), addr.port()))
    }

    #[tokio::test]
    async fn test_found_empty_and_error_replies() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.insert("join-store", b"j-1", Bytes::from_static(b"123"));
        let (addr, _shutdown) = spawn_server(Arc::clone(&runtime)).await;

        let stub = stub_for(addr);
        stub.initialize().await.unwrap();

        let hit = stub.find_by_key(b"j-1", "join-store").await.unwrap();
        assert_eq!(hit, Some(Bytes::from_static(b"123")));

        let miss = stub.find_by_key(b"j-9", "join-store").await.unwrap();
        assert_eq!(miss, None);

        let err = stub.find_by_key(b"j-1", "missing-store").await.unwrap_err();
        assert!(matches!(err, QueryError::Runtime(_)));

        stub.shutdown().await;
    }

    #[tokio::test]
    async fn test_multiple_requests_on_one_connection() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.insert("store", b"a", Bytes::from_static(b"1"));
        runtime.insert("store", b"b", Bytes::from_static(b"2"));
        let (addr, _shutdown) = spawn_server(runtime).await;

        let stub = stub_for(addr);
        stub.initialize().await.unwrap();

        for (key, expected) in [(&b"a"[..], &b"1"[..]), (b"b", b"2"), (b"a", b"1")] {
            let value = stub.find_by_key(key, "store").await.unwrap().unwrap();
            assert_eq!(&value[..], expected);
        }
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_accepting() {
        let runtime = Arc::new(MockRuntime::new());
        let (addr, shutdown) = spawn_server(runtime).await;
        shutdown.send(()).unwrap();
        // Give the accept loop a beat to observe the signal.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stub = stub_for(addr);
        assert!(stub.initialize().await.is_err() || {
            // The connect may still succeed if the OS had the socket in the
            // backlog; a query must then fail instead.
            stub.find_by_key(b"k", "store").await.is_err()
        });
    }

    #[test]
    fn test_server_is_typed_for_key_value_stores() {
        let stub = RemoteStoreStub::new(HostInfo::new("localhost", 19099));
        assert!(stub.is_compatible(StoreTypeTag::KeyValue));
    }
}
