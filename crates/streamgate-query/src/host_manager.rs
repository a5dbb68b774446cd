//! Host manager: key routing and the per-host stub cache.
//!
//! Routing asks the runtime where a key's partition lives; the stub cache
//! keeps one initialized [`QueryableStore`] per host, shared by every
//! concurrent caller. Stub creation happens under the cache's write lock so
//! two resolvers can never initialize two stubs for the same host — an
//! observer that finds a stub in the cache always finds a fully initialized
//! one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use streamgate_core::{HostInfo, KeyQueryMetadata, StoreTypeTag, StreamRuntime};

use crate::error::Result;
use crate::store::{ChannelConfig, ChannelConfigurer, QueryableStore};

/// Routes `(store, key)` pairs to their owning host and materializes the
/// store representation for that host.
pub struct HostManager {
    runtime: Arc<dyn StreamRuntime>,
    supported: Vec<Arc<dyn QueryableStore>>,
    configurers: Vec<Arc<dyn ChannelConfigurer>>,
    stubs: RwLock<HashMap<HostInfo, Arc<dyn QueryableStore>>>,
}

impl HostManager {
    pub fn new(
        runtime: Arc<dyn StreamRuntime>,
        supported: Vec<Arc<dyn QueryableStore>>,
        configurers: Vec<Arc<dyn ChannelConfigurer>>,
    ) -> Self {
        Self {
            runtime,
            supported,
            configurers,
            stubs: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the host owning `key`'s partition in `store_name`.
    ///
    /// When the runtime reports the placement as not available (cold start,
    /// in-flight rebalance), fall back to the lowest known instance — in a
    /// single-instance deployment that is the instance itself, which can
    /// already answer.
    pub fn find_host(&self, key: &[u8], store_name: &str) -> Option<HostInfo> {
        match self.runtime.query_metadata_for_key(store_name, key) {
            KeyQueryMetadata::Available { active, .. } => Some(active),
            KeyQueryMetadata::NotAvailable => {
                let fallback = self.runtime.metadata_for_all_clients().into_iter().min();
                if let Some(host) = &fallback {
                    debug!(
                        store = %store_name,
                        host = %host,
                        "key placement not available, falling back to first known instance"
                    );
                }
                fallback
            }
        }
    }

    /// Linear lookup of a configured store by its stable reference.
    pub fn find_store_by_reference(&self, reference: &str) -> Option<Arc<dyn QueryableStore>> {
        let found = self
            .supported
            .iter()
            .find(|store| store.reference() == reference)
            .cloned();
        if found.is_none() {
            trace!(reference = %reference, "no configured store for reference");
        }
        found
    }

    /// Resolve the store representation serving `tag` on `host`, creating
    /// and initializing a stub on first use.
    ///
    /// `Ok(None)` means no configured store is compatible with `tag`; an
    /// initialization failure is surfaced as an error rather than swallowed
    /// into the `None` case.
    pub async fn find_store(
        &self,
        host: &HostInfo,
        tag: StoreTypeTag,
    ) -> Result<Option<Arc<dyn QueryableStore>>> {
        let template = match self.supported.iter().find(|store| store.is_compatible(tag)) {
            Some(template) => template,
            None => {
                trace!(host = %host, tag = %tag, "no compatible store configured");
                return Ok(None);
            }
        };

        if let Some(stub) = self.stubs.read().await.get(host) {
            return Ok(Some(Arc::clone(stub)));
        }

        let mut stubs = self.stubs.write().await;
        // Double-checked: another resolver may have won the race.
        if let Some(stub) = stubs.get(host) {
            return Ok(Some(Arc::clone(stub)));
        }

        let stub = template.stub(host.clone());

        let mut config = ChannelConfig::default();
        for configurer in &self.configurers {
            configurer.configure(&mut config);
        }
        stub.configure(&config).await;

        info!(host = %host, reference = %stub.reference(), "initializing stub for host");
        stub.initialize().await?;

        stubs.insert(host.clone(), Arc::clone(&stub));
        Ok(Some(stub))
    }

    /// Shut down every cached stub exactly once and clear the cache.
    pub async fn clean_up(&self) {
        let drained: Vec<(HostInfo, Arc<dyn QueryableStore>)> =
            self.stubs.write().await.drain().collect();

        if drained.is_empty() {
            return;
        }

        info!("host manager clean-up, remote queries may be temporarily unavailable");
        for (host, stub) in drained {
            stub.shutdown().await;
            warn!(host = %host, "removed host from known hosts");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use streamgate_core::runtime::mock::MockRuntime;

    use crate::error::QueryError;

    /// A stub whose lifecycle calls are observable.
    struct CountingStore {
        host: Option<HostInfo>,
        initialized: Arc<AtomicUsize>,
        shut_down: Arc<AtomicUsize>,
        fail_initialize: bool,
    }

    impl CountingStore {
        fn template(fail_initialize: bool) -> (Arc<dyn QueryableStore>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let initialized = Arc::new(AtomicUsize::new(0));
            let shut_down = Arc::new(AtomicUsize::new(0));
            let store: Arc<dyn QueryableStore> = Arc::new(CountingStore {
                host: None,
                initialized: Arc::clone(&initialized),
                shut_down: Arc::clone(&shut_down),
                fail_initialize,
            });
            (store, initialized, shut_down)
        }
    }

    #[async_trait]
    impl QueryableStore for CountingStore {
        fn reference(&self) -> &str {
            "counting-store"
        }

        fn is_compatible(&self, tag: StoreTypeTag) -> bool {
            tag == StoreTypeTag::KeyValue
        }

        fn stub(&self, host: HostInfo) -> Arc<dyn QueryableStore> {
            Arc::new(CountingStore {
                host: Some(host),
                initialized: Arc::clone(&self.initialized),
                shut_down: Arc::clone(&self.shut_down),
                fail_initialize: self.fail_initialize,
            })
        }

        async fn configure(&self, _config: &ChannelConfig) {}

        async fn initialize(&self) -> crate::error::Result<()> {
            if self.fail_initialize {
                return Err(QueryError::Transport("refused".to_string()));
            }
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&self) {
            self.shut_down.fetch_add(1, Ordering::SeqCst);
        }

        async fn find_by_key(&self, _key: &[u8], _store: &str) -> crate::error::Result<Option<Bytes>> {
            let _ = &self.host;
            Ok(None)
        }
    }

    fn manager_with(template: Arc<dyn QueryableStore>) -> HostManager {
        HostManager::new(Arc::new(MockRuntime::new()), vec![template], vec![])
    }

    #[tokio::test]
    async fn test_find_store_caches_one_stub_per_host() {
        let (template, initialized, _) = CountingStore::template(false);
        let manager = manager_with(template);
        let host = HostInfo::new("localhost", 19099);

        let first = manager
            .find_store(&host, StoreTypeTag::KeyValue)
            .await
            .unwrap()
            .unwrap();
        let second = manager
            .find_store(&host, StoreTypeTag::KeyValue)
            .await
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(initialized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolvers_observe_the_same_stub() {
        let (template, initialized, _) = CountingStore::template(false);
        let manager = Arc::new(manager_with(template));
        let host = HostInfo::new("localhost", 19099);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            let host = host.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .find_store(&host, StoreTypeTag::KeyValue)
                    .await
                    .unwrap()
                    .unwrap()
            }));
        }

        let stubs: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        for stub in &stubs[1..] {
            assert!(Arc::ptr_eq(&stubs[0], stub));
        }
        assert_eq!(initialized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incompatible_tag_resolves_to_none() {
        let (template, _, _) = CountingStore::template(false);
        let manager = manager_with(template);
        let host = HostInfo::new("localhost", 19099);

        let resolved = manager
            .find_store(&host, StoreTypeTag::TimestampedKeyValue)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_initialize_failure_is_an_error_and_not_cached() {
        let (template, _, _) = CountingStore::template(true);
        let manager = manager_with(template);
        let host = HostInfo::new("localhost", 19099);

        let err = manager
            .find_store(&host, StoreTypeTag::KeyValue)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
        assert!(manager.stubs.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_clean_up_shuts_down_each_stub_exactly_once() {
        let (template, _, shut_down) = CountingStore::template(false);
        let manager = manager_with(template);

        for port in [19099, 19199, 19299] {
            manager
                .find_store(&HostInfo::new("localhost", port), StoreTypeTag::KeyValue)
                .await
                .unwrap()
                .unwrap();
        }

        manager.clean_up().await;
        assert_eq!(shut_down.load(Ordering::SeqCst), 3);
        assert!(manager.stubs.read().await.is_empty());

        // A second clean-up finds nothing to do.
        manager.clean_up().await;
        assert_eq!(shut_down.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_find_host_uses_active_host() {
        let runtime = Arc::new(MockRuntime::new());
        let owner = HostInfo::new("localhost", 19199);
        runtime.route(b"j-1", owner.clone());

        let (template, _, _) = CountingStore::template(false);
        let manager = HostManager::new(runtime, vec![template], vec![]);

        assert_eq!(manager.find_host(b"j-1", "join-store"), Some(owner));
    }

    #[tokio::test]
    async fn test_find_host_falls_back_to_lowest_known_instance() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.set_clients(vec![
            HostInfo::new("localhost", 19199),
            HostInfo::new("localhost", 19099),
        ]);

        let (template, _, _) = CountingStore::template(false);
        let manager = HostManager::new(runtime, vec![template], vec![]);

        // Unrouted key: metadata is NotAvailable, lowest (host, port) wins.
        assert_eq!(
            manager.find_host(b"unrouted", "join-store"),
            Some(HostInfo::new("localhost", 19099))
        );
    }

    #[tokio::test]
    async fn test_find_host_none_when_nothing_is_known() {
        let (template, _, _) = CountingStore::template(false);
        let manager = manager_with(template);
        assert_eq!(manager.find_host(b"k", "join-store"), None);
    }

    #[tokio::test]
    async fn test_find_store_by_reference() {
        let (template, _, _) = CountingStore::template(false);
        let manager = manager_with(template);

        assert!(manager.find_store_by_reference("counting-store").is_some());
        assert!(manager.find_store_by_reference("other").is_none());
    }

    #[tokio::test]
    async fn test_channel_configurers_run_in_order() {
        struct SetConnect(u64);
        impl ChannelConfigurer for SetConnect {
            fn configure(&self, config: &mut ChannelConfig) {
                config.connect_timeout = std::time::Duration::from_secs(self.0);
            }
        }

        struct Observed(Arc<std::sync::Mutex<Option<ChannelConfig>>>);

        #[async_trait]
        impl QueryableStore for Observed {
            fn reference(&self) -> &str {
                "observed"
            }
            fn is_compatible(&self, _tag: StoreTypeTag) -> bool {
                true
            }
            fn stub(&self, _host: HostInfo) -> Arc<dyn QueryableStore> {
                Arc::new(Observed(Arc::clone(&self.0)))
            }
            async fn configure(&self, config: &ChannelConfig) {
                *self.0.lock().unwrap() = Some(config.clone());
            }
            async fn initialize(&self) -> crate::error::Result<()> {
                Ok(())
            }
            async fn shutdown(&self) {}
            async fn find_by_key(&self, _k: &[u8], _s: &str) -> crate::error::Result<Option<Bytes>> {
                Ok(None)
            }
        }

        let seen = Arc::new(std::sync::Mutex::new(None));
        let manager = HostManager::new(
            Arc::new(MockRuntime::new()),
            vec![Arc::new(Observed(Arc::clone(&seen))) as Arc<dyn QueryableStore>],
            vec![
                Arc::new(SetConnect(3)) as Arc<dyn ChannelConfigurer>,
                Arc::new(SetConnect(7)),
            ],
        );

        manager
            .find_store(&HostInfo::new("localhost", 19099), StoreTypeTag::KeyValue)
            .await
            .unwrap()
            .unwrap();

        let config = seen.lock().unwrap().clone().expect("configure was applied");
        assert_eq!(config.connect_timeout, std::time::Duration::from_secs(7));
    }
}
