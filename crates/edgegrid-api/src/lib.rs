//! edgegrid-api — REST API for EdgeGrid.
//!
//! The caller's tenant comes from the `x-tenant-id` header. Every request
//! runs under a cancellation token that fires when the configured request
//! timeout elapses or the client goes away.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/edge-clusters` | Create an edge cluster |
//! | GET | `/api/v1/edge-clusters/{id}` | Get an edge cluster |
//! | PUT | `/api/v1/edge-clusters/{id}` | Update name and secret |
//! | DELETE | `/api/v1/edge-clusters/{id}` | Delete an edge cluster |
//! | POST | `/api/v1/edge-clusters/search` | Filtered, sorted, paginated search |
//! | GET | `/healthz` | Liveness |
//!
//! Responses never include an edge cluster's secret.

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use edgegrid_orchestrator::EdgeClusterService;

/// Header carrying the calling tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: EdgeClusterService,
    pub request_timeout: Duration,
}

/// Build the complete API router.
pub fn build_router(service: EdgeClusterService, request_timeout: Duration) -> Router {
    let api_state = ApiState {
        service,
        request_timeout,
    };

    let api_routes = Router::new()
        .route("/edge-clusters", post(handlers::create_edge_cluster))
        .route("/edge-clusters/search", post(handlers::search_edge_clusters))
        .route(
            "/edge-clusters/{id}",
            get(handlers::get_edge_cluster)
                .put(handlers::update_edge_cluster)
                .delete(handlers::delete_edge_cluster),
        )
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
