//! Shared application state.
//!
//! Everything a view needs, built once from the configuration.

use std::sync::Arc;

use crate::auth::{AuthGateway, SessionStore};
use crate::backend::{create_backend, Backend};
use crate::config::ConfigV1;
use crate::dashboard::DashboardAggregator;
use crate::metrics::Metrics;
use crate::routes::{create_route_table, RouteTable};
use crate::services::{RoomImageService, RoomService, UserService};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    pub backend: Backend,
    /// Single owner of the session state.
    pub session: Arc<SessionStore>,
    pub gateway: Arc<AuthGateway>,
    pub routes: Arc<RouteTable>,
    pub dashboard: Arc<DashboardAggregator>,
    pub users: UserService,
    pub rooms: RoomService,
    pub room_images: RoomImageService,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Arc<ConfigV1>) -> Self {
        let backend = create_backend(&config.backend);
        Self::with_backend(config, backend)
    }

    /// Builds the state around an existing backend (tests inject in-memory ones).
    pub fn with_backend(config: Arc<ConfigV1>, backend: Backend) -> Self {
        let metrics = Metrics::new();
        let users = UserService::new(backend.store.clone());

        AppState {
            session: Arc::new(SessionStore::new(
                backend.identity.clone(),
                metrics.clone(),
            )),
            gateway: Arc::new(AuthGateway::new(
                backend.identity.clone(),
                users.clone(),
                config.app.clone(),
                metrics.clone(),
            )),
            routes: Arc::new(create_route_table(&config.routes, metrics.clone())),
            dashboard: Arc::new(DashboardAggregator::new(
                backend.store.clone(),
                backend.identity.clone(),
                config.dashboard.clone(),
                metrics.clone(),
            )),
            rooms: RoomService::new(backend.store.clone()),
            room_images: RoomImageService::new(backend.store.clone(), backend.files.clone()),
            users,
            metrics,
            backend,
            config,
        }
    }
}
