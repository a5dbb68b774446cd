//! Management HTTP surface for Streamgate.
//!
//! Two endpoint families, mounted only when exposed by configuration:
//!
//! - `GET /readonlystatestore/{store}/{key}?serde=` — federated point read.
//!   Always HTTP 200: a degraded `{"message": …}` reply beats a 5xx for the
//!   dashboards that poll this surface.
//! - `POST|DELETE|GET /autopilot` — manual thread scaling and status.
//!
//! [`AppState::from_runtime`] performs the conditional wiring: requesting
//! the state-store endpoint without a configured `application.server` is a
//! construction error, not a half-working route.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use thiserror::Error;

use streamgate_autopilot::{Autopilot, RecoveryWindowManager};
use streamgate_core::{AutopilotConfig, Properties, StreamRuntime};
use streamgate_query::{
    HostManager, InteractiveQuery, LocalKeyValueStore, QueryError, QueryableStore, SerdeRegistry,
};

pub mod handlers;
pub mod models;

/// Comma-separated list of management endpoints to expose
/// (`readonlystatestore`, `autopilot`).
pub const EXPOSURE_INCLUDE: &str = "management.endpoints.web.exposure.include";

pub const STATE_STORE_ENDPOINT: &str = "readonlystatestore";
pub const AUTOPILOT_ENDPOINT: &str = "autopilot";

/// Errors building the management surface.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Config(#[from] streamgate_core::Error),
}

/// Which endpoint families the configuration exposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointExposure {
    pub state_store: bool,
    pub autopilot: bool,
}

impl EndpointExposure {
    pub fn from_properties(properties: &Properties) -> Self {
        let mut exposure = Self::default();
        if let Some(raw) = properties.get(EXPOSURE_INCLUDE) {
            for endpoint in raw.split(',').map(str::trim) {
                match endpoint {
                    STATE_STORE_ENDPOINT => exposure.state_store = true,
                    AUTOPILOT_ENDPOINT => exposure.autopilot = true,
                    _ => {}
                }
            }
        }
        exposure
    }
}

/// Shared state for all management handlers.
#[derive(Clone)]
pub struct AppState {
    pub query: Option<Arc<InteractiveQuery>>,
    pub autopilot: Option<Arc<Autopilot>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("query", &self.query.is_some())
            .field("autopilot", &self.autopilot.is_some())
            .finish()
    }
}

impl AppState {
    /// Wire the exposed endpoints from configuration.
    ///
    /// The state-store plane requires a valid `application.server`; its
    /// absence is fatal here rather than a 404 at query time. When the
    /// autopilot is both exposed and enabled, its scheduled loop starts
    /// immediately (must run inside a tokio runtime).
    pub fn from_runtime(
        runtime: Arc<dyn StreamRuntime>,
        properties: &Properties,
    ) -> Result<Self, SetupError> {
        let exposure = EndpointExposure::from_properties(properties);

        let query = if exposure.state_store {
            let local: Arc<dyn QueryableStore> =
                Arc::new(LocalKeyValueStore::new(Arc::clone(&runtime), properties)?);
            let manager = Arc::new(HostManager::new(Arc::clone(&runtime), vec![local], vec![]));
            Some(Arc::new(InteractiveQuery::new(
                SerdeRegistry::with_defaults(),
                manager,
                properties.generic_timeout(),
            )))
        } else {
            None
        };

        let autopilot = if exposure.autopilot {
            let config = AutopilotConfig::from_properties(properties)?;
            let enabled = config.enabled;
            let grace = config.between_runs;
            let pilot = Arc::new(Autopilot::new(Arc::clone(&runtime), config, properties));
            if enabled {
                let window = Arc::new(RecoveryWindowManager::new(
                    runtime.subscribe_state_changes(),
                    grace,
                ));
                Arc::clone(&pilot).automate(window);
            }
            Some(pilot)
        } else {
            None
        };

        Ok(Self { query, autopilot })
    }
}

/// Build the management router. Routes exist only for the endpoint
/// families present in `state`.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health));

    if state.query.is_some() {
        router = router.route(
            "/readonlystatestore/:store/:key",
            get(handlers::state_store::find),
        );
    }

    if state.autopilot.is_some() {
        router = router.route(
            "/autopilot",
            get(handlers::autopilot::status)
                .post(handlers::autopilot::add)
                .delete(handlers::autopilot::remove),
        );
    }

    router.with_state(state)
}
