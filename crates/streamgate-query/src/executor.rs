//! Interactive query executor.
//!
//! Turns a textual query request into a routed, typed point read. Serde
//! resolution happens *before* routing on purpose: the runtime computes the
//! partition from the serialized key bytes, so the typed key must exist
//! before the owning host can be known.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use streamgate_core::StoreTypeTag;

use crate::error::{QueryError, Result};
use crate::host_manager::HostManager;
use crate::serdes::{convert_key, SerdeRegistry};

/// A point-read request as it arrives from the management surface.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub store_name: String,
    /// The key, stringified by the caller.
    pub key: String,
    /// Key codec name; the registry default when absent.
    pub serde_class: Option<String>,
}

/// Executes interactive queries: resolve serde, convert and serialize the
/// key, route, dispatch local-or-remote.
pub struct InteractiveQuery {
    registry: SerdeRegistry,
    host_manager: Arc<HostManager>,
    timeout: Duration,
}

impl InteractiveQuery {
    pub fn new(registry: SerdeRegistry, host_manager: Arc<HostManager>, timeout: Duration) -> Self {
        Self {
            registry,
            host_manager,
            timeout,
        }
    }

    /// Execute a point read. The public endpoint queries key/value stores;
    /// other store type tags are reserved.
    pub async fn find_by_key(&self, request: &QueryRequest) -> Result<Option<Bytes>> {
        let serde = match &request.serde_class {
            Some(name) => self.registry.by_name(name)?,
            None => self.registry.default_serde(),
        };

        let typed_key = convert_key(&request.key, serde.key_type())?;
        let key = serde.serialize(&typed_key)?;

        let host = self
            .host_manager
            .find_host(&key, &request.store_name)
            .ok_or_else(|| QueryError::NoRoute(request.store_name.clone()))?;

        let store = self
            .host_manager
            .find_store(&host, StoreTypeTag::KeyValue)
            .await?
            .ok_or_else(|| QueryError::NoStoreForHost(host.clone()))?;

        trace!(
            store = %request.store_name,
            host = %host,
            serde = %serde.name(),
            "dispatching interactive query"
        );

        tokio::time::timeout(self.timeout, store.find_by_key(&key, &request.store_name))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use streamgate_core::config::APPLICATION_SERVER;
    use streamgate_core::runtime::mock::MockRuntime;
    use streamgate_core::{HostInfo, Properties, StreamRuntime};

    use crate::local::LocalKeyValueStore;
    use crate::store::QueryableStore;

    fn executor_for(runtime: Arc<MockRuntime>) -> InteractiveQuery {
        let properties: Properties = [(APPLICATION_SERVER, "localhost:19099")]
            .into_iter()
            .collect();
        let local: Arc<dyn QueryableStore> = Arc::new(
            LocalKeyValueStore::new(Arc::clone(&runtime) as Arc<dyn StreamRuntime>, &properties)
                .unwrap(),
        );
        let manager = Arc::new(HostManager::new(runtime, vec![local], vec![]));
        InteractiveQuery::new(SerdeRegistry::with_defaults(), manager, Duration::from_secs(5))
    }

    fn request(store: &str, key: &str, serde: Option<&str>) -> QueryRequest {
        QueryRequest {
            store_name: store.to_string(),
            key: key.to_string(),
            serde_class: serde.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_local_hit_with_default_serde() {
        let runtime = Arc::new(MockRuntime::new());
        let self_host = HostInfo::new("localhost", 19099);
        runtime.insert("join-store", b"j-1", Bytes::from_static(b"123"));
        runtime.route(b"j-1", self_host);

        let executor = executor_for(runtime);
        let value = executor
            .find_by_key(&request("join-store", "j-1", None))
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"123")));
    }

    #[tokio::test]
    async fn test_absent_key_is_none() {
        let runtime = Arc::new(MockRuntime::new());
        let self_host = HostInfo::new("localhost", 19099);
        runtime.create_store("join-store");
        runtime.route(b"j-9", self_host);

        let executor = executor_for(runtime);
        let value = executor
            .find_by_key(&request("join-store", "j-9", None))
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_custom_serde_routes_by_serialized_bytes() {
        let runtime = Arc::new(MockRuntime::new());
        let self_host = HostInfo::new("localhost", 19099);
        let key = 25i64.to_be_bytes();
        runtime.insert("sum-store", key, Bytes::from_static(b"6"));
        runtime.route(key, self_host);

        let executor = executor_for(runtime);
        let value = executor
            .find_by_key(&request("sum-store", "25", Some("LongSerde")))
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"6")));
    }

    #[tokio::test]
    async fn test_bad_key_conversion_surfaces_parser_message() {
        let runtime = Arc::new(MockRuntime::new());
        let executor = executor_for(runtime);

        let err = executor
            .find_by_key(&request("sum-store", "25L", Some("LongSerde")))
            .await
            .unwrap_err();
        match err {
            QueryError::KeyConversion(message) => {
                assert!(message.contains("invalid digit"), "message was: {}", message)
            }
            other => panic!("expected KeyConversion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_serde() {
        let runtime = Arc::new(MockRuntime::new());
        let executor = executor_for(runtime);

        let err = executor
            .find_by_key(&request("join-store", "j-1", Some("AvroSerde")))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownSerde(_)));
    }

    #[tokio::test]
    async fn test_no_route_when_nothing_is_known() {
        let runtime = Arc::new(MockRuntime::new());
        let executor = executor_for(runtime);

        let err = executor
            .find_by_key(&request("join-store", "j-1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NoRoute(store) if store == "join-store"));
    }

    #[tokio::test]
    async fn test_not_available_falls_back_to_sole_instance() {
        let runtime = Arc::new(MockRuntime::new());
        let self_host = HostInfo::new("localhost", 19099);
        runtime.set_clients(vec![self_host]);
        runtime.insert("join-store", b"j-1", Bytes::from_static(b"123"));
        // No route for the key: metadata is NotAvailable, but the sole
        // known instance (ourselves) can answer.

        let executor = executor_for(runtime);
        let value = executor
            .find_by_key(&request("join-store", "j-1", None))
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"123")));
    }
}
