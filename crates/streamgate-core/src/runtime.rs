//! The capability seam between Streamgate and the stream-processing runtime.
//!
//! Streamgate never talks to the consumer runtime directly. Everything it
//! needs — key placement metadata, local store reads, thread add/remove,
//! state-change notifications — goes through [`StreamRuntime`], shared as
//! `Arc<dyn StreamRuntime>` across the query executor, the host manager,
//! the local store adapter, and the autopilot.
//!
//! State changes ride a `tokio::sync::watch` channel: subscribers always
//! observe the current state (late subscribers included), which is exactly
//! what the recovery-window manager needs — there is no event backlog to
//! replay.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::{HostInfo, KeyQueryMetadata, RuntimeState, ThreadMetadata};

/// Read-only access to the underlying stream-processing runtime.
///
/// Metadata lookups and `thread_metadata` are synchronous and non-blocking
/// in contract. `local_get` completes with whatever the local store holds.
/// `add_stream_thread` / `remove_stream_thread` are the runtime's blocking
/// scaling primitives; they return the affected thread's name, or `None`
/// when the runtime could not comply (already at its own limit, no thread
/// left to remove).
#[async_trait]
pub trait StreamRuntime: Send + Sync {
    /// Placement of the partition owning `key` in `store_name`. The runtime
    /// computes the partition from the serialized key bytes.
    fn query_metadata_for_key(&self, store_name: &str, key: &[u8]) -> KeyQueryMetadata;

    /// Every instance currently known to participate in the application.
    fn metadata_for_all_clients(&self) -> Vec<HostInfo>;

    /// Point read against the local state store `store_name`.
    async fn local_get(&self, store_name: &str, key: &[u8]) -> Result<Option<Bytes>>;

    /// Task and offset metadata for every local processing thread.
    fn thread_metadata(&self) -> Vec<ThreadMetadata>;

    async fn add_stream_thread(&self) -> Result<Option<String>>;

    async fn remove_stream_thread(&self) -> Result<Option<String>>;

    /// Current lifecycle state.
    fn state(&self) -> RuntimeState;

    /// Subscribe to lifecycle state changes.
    fn subscribe_state_changes(&self) -> watch::Receiver<RuntimeState>;
}

impl std::fmt::Debug for dyn StreamRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamRuntime").field(&self.state()).finish()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    //! In-memory [`StreamRuntime`] for tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::watch;

    use crate::error::{Error, Result};
    use crate::types::{HostInfo, KeyQueryMetadata, RuntimeState, ThreadMetadata};

    /// Scriptable in-memory runtime: stores, key routes, thread metadata and
    /// lifecycle state are all set by the test.
    pub struct MockRuntime {
        stores: RwLock<HashMap<String, HashMap<Vec<u8>, Bytes>>>,
        routes: RwLock<HashMap<Vec<u8>, HostInfo>>,
        clients: RwLock<Vec<HostInfo>>,
        threads: RwLock<Vec<ThreadMetadata>>,
        added: AtomicUsize,
        removed: AtomicUsize,
        state_tx: watch::Sender<RuntimeState>,
    }

    impl Default for MockRuntime {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockRuntime {
        pub fn new() -> Self {
            let (state_tx, _) = watch::channel(RuntimeState::Running);
            Self {
                stores: RwLock::new(HashMap::new()),
                routes: RwLock::new(HashMap::new()),
                clients: RwLock::new(Vec::new()),
                threads: RwLock::new(Vec::new()),
                added: AtomicUsize::new(0),
                removed: AtomicUsize::new(0),
                state_tx,
            }
        }

        pub fn insert(&self, store: &str, key: impl AsRef<[u8]>, value: impl Into<Bytes>) {
            let mut stores = self.stores.write().unwrap();
            stores
                .entry(store.to_string())
                .or_default()
                .insert(key.as_ref().to_vec(), value.into());
        }

        /// Declare `store` so lookups of absent keys report `Ok(None)`
        /// instead of an unavailable store.
        pub fn create_store(&self, store: &str) {
            self.stores
                .write()
                .unwrap()
                .entry(store.to_string())
                .or_default();
        }

        /// Route serialized `key` bytes to `host` as the active owner.
        pub fn route(&self, key: impl AsRef<[u8]>, host: HostInfo) {
            self.routes
                .write()
                .unwrap()
                .insert(key.as_ref().to_vec(), host);
        }

        pub fn set_clients(&self, clients: Vec<HostInfo>) {
            *self.clients.write().unwrap() = clients;
        }

        pub fn set_threads(&self, threads: Vec<ThreadMetadata>) {
            *self.threads.write().unwrap() = threads;
        }

        pub fn set_state(&self, state: RuntimeState) {
            self.state_tx.send_replace(state);
        }

        pub fn added_threads(&self) -> usize {
            self.added.load(Ordering::SeqCst)
        }

        pub fn removed_threads(&self) -> usize {
            self.removed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl super::StreamRuntime for MockRuntime {
        fn query_metadata_for_key(&self, _store_name: &str, key: &[u8]) -> KeyQueryMetadata {
            match self.routes.read().unwrap().get(key) {
                Some(host) => KeyQueryMetadata::Available {
                    active: host.clone(),
                    standbys: vec![],
                    partition: 0,
                },
                None => KeyQueryMetadata::NotAvailable,
            }
        }

        fn metadata_for_all_clients(&self) -> Vec<HostInfo> {
            self.clients.read().unwrap().clone()
        }

        async fn local_get(&self, store_name: &str, key: &[u8]) -> Result<Option<Bytes>> {
            let stores = self.stores.read().unwrap();
            let store = stores
                .get(store_name)
                .ok_or_else(|| Error::StoreNotAvailable(store_name.to_string()))?;
            Ok(store.get(key).cloned())
        }

        fn thread_metadata(&self) -> Vec<ThreadMetadata> {
            self.threads.read().unwrap().clone()
        }

        async fn add_stream_thread(&self) -> Result<Option<String>> {
            let count = self.added.fetch_add(1, Ordering::SeqCst) + 1;
            let name = format!("stream-thread-{}", count);
            self.threads.write().unwrap().push(ThreadMetadata {
                thread_name: name.clone(),
                ..Default::default()
            });
            Ok(Some(name))
        }

        async fn remove_stream_thread(&self) -> Result<Option<String>> {
            let removed = self.threads.write().unwrap().pop();
            match removed {
                Some(thread) => {
                    self.removed.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(thread.thread_name))
                }
                None => Ok(None),
            }
        }

        fn state(&self) -> RuntimeState {
            *self.state_tx.borrow()
        }

        fn subscribe_state_changes(&self) -> watch::Receiver<RuntimeState> {
            self.state_tx.subscribe()
        }
    }
}
