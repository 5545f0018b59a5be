//! REST API handlers.
//!
//! Each handler resolves the tenant, runs one [`EdgeClusterService`]
//! operation under the request deadline, and answers with the JSON
//! envelope.
//!
//! [`EdgeClusterService`]: edgegrid_orchestrator::EdgeClusterService

use std::future::Future;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use edgegrid_core::{ClusterType, EdgeCluster, EdgeClusterUpdate, NewEdgeCluster};
use edgegrid_orchestrator::{EdgeError, EdgeResult};
use edgegrid_search::{Page, PageInfo, SearchQuery};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{ApiState, TENANT_HEADER};

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Body of a successful create.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Created {
    pub id: String,
}

/// An edge cluster as callers see it. The cluster secret is write-only.
#[derive(Debug, serde::Serialize)]
pub struct EdgeClusterView {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub cluster_type: ClusterType,
}

impl From<EdgeCluster> for EdgeClusterView {
    fn from(cluster: EdgeCluster) -> Self {
        Self {
            id: cluster.id,
            tenant_id: cluster.tenant_id,
            name: cluster.name,
            cluster_type: cluster.cluster_type,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EdgeView {
    pub cursor: String,
    pub node: EdgeClusterView,
}

/// A search page with every node redacted.
#[derive(Debug, serde::Serialize)]
pub struct PageView {
    pub edges: Vec<EdgeView>,
    pub total_count: usize,
    pub page_info: PageInfo,
}

impl From<Page> for PageView {
    fn from(page: Page) -> Self {
        Self {
            edges: page
                .edges
                .into_iter()
                .map(|edge| EdgeView {
                    cursor: edge.cursor,
                    node: edge.node.into(),
                })
                .collect(),
            total_count: page.total_count,
            page_info: page.page_info,
        }
    }
}

fn status_for(err: &EdgeError) -> StatusCode {
    match err {
        EdgeError::TenantNotFound { .. } | EdgeError::EdgeClusterNotFound { .. } => StatusCode::NOT_FOUND,
        EdgeError::EdgeClusterAlreadyExists => StatusCode::CONFLICT,
        EdgeError::ArgumentNil { .. } | EdgeError::ArgumentInvalid { .. } => StatusCode::BAD_REQUEST,
        EdgeError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        EdgeError::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &EdgeError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

fn tenant_id(headers: &HeaderMap) -> EdgeResult<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(EdgeError::ArgumentNil { name: "tenant_id" })
}

/// Run `op` with a token that is cancelled once `timeout` passes or the
/// handler future is dropped.
async fn within_deadline<T, F, Fut>(timeout: Duration, op: F) -> EdgeResult<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = EdgeResult<T>>,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    match tokio::time::timeout(timeout, op(cancel)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis(), "request deadline exceeded");
            Err(EdgeError::Cancelled)
        }
    }
}

// ── Edge clusters ──────────────────────────────────────────────

/// POST /api/v1/edge-clusters
pub async fn create_edge_cluster(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(spec): Json<NewEdgeCluster>,
) -> Response {
    let result = match tenant_id(&headers) {
        Ok(tenant) => {
            within_deadline(state.request_timeout, |cancel| async move {
                state.service.create(&tenant, spec, &cancel).await
            })
            .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(id) => (StatusCode::CREATED, ApiResponse::ok(Created { id })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/edge-clusters/{id}
pub async fn get_edge_cluster(State(state): State<ApiState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let result = match tenant_id(&headers) {
        Ok(tenant) => {
            within_deadline(state.request_timeout, |cancel| async move {
                state.service.read(&tenant, &id, &cancel).await
            })
            .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(cluster) => ApiResponse::ok(EdgeClusterView::from(cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/v1/edge-clusters/{id}
pub async fn update_edge_cluster(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<EdgeClusterUpdate>,
) -> Response {
    let result = match tenant_id(&headers) {
        Ok(tenant) => {
            within_deadline(state.request_timeout, |cancel| async move {
                state.service.update(&tenant, &id, update, &cancel).await
            })
            .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(cluster) => ApiResponse::ok(EdgeClusterView::from(cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/v1/edge-clusters/{id}
pub async fn delete_edge_cluster(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let result = match tenant_id(&headers) {
        Ok(tenant) => {
            within_deadline(state.request_timeout, |cancel| async move {
                state.service.delete(&tenant, &id, &cancel).await
            })
            .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Search ─────────────────────────────────────────────────────

/// POST /api/v1/edge-clusters/search
///
/// The body is a search query; its `tenant_id` is always replaced by the
/// caller's tenant.
pub async fn search_edge_clusters(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut query): Json<SearchQuery>,
) -> Response {
    let result = match tenant_id(&headers) {
        Ok(tenant) => {
            query.tenant_id = tenant;
            within_deadline(state.request_timeout, |cancel| async move {
                state.service.search(&query, &cancel).await
            })
            .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(page) => ApiResponse::ok(PageView::from(page)).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}
