//! EdgeClusterService — the caller-facing edge-cluster operations.
//!
//! Every mutating verb commits the record first and then converges the
//! workload. A provisioning failure never rolls the record back: the
//! stored record keeps the caller's intent and the error tells the caller
//! the workload has not caught up.

use std::sync::Arc;

use edgegrid_core::config::ProvisionerConfig;
use edgegrid_core::{ClusterType, EdgeCluster, EdgeClusterId, EdgeClusterUpdate, NewEdgeCluster};
use edgegrid_provisioner::{EdgeClusterProvisioner, HostPlatform};
use edgegrid_search::{Page, SearchEngine, SearchQuery};
use edgegrid_state::TenantRepository;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{EdgeError, EdgeResult};

/// Longest accepted edge-cluster name.
pub const MAX_NAME_LEN: usize = 253;

#[derive(Clone)]
pub struct EdgeClusterService {
    repo: TenantRepository,
    search: SearchEngine,
    platform: Arc<dyn HostPlatform>,
    config: ProvisionerConfig,
}

impl EdgeClusterService {
    pub fn new(repo: TenantRepository, platform: Arc<dyn HostPlatform>, config: ProvisionerConfig) -> Self {
        Self {
            search: SearchEngine::new(repo.clone()),
            repo,
            platform,
            config,
        }
    }

    fn provisioner(&self, cluster_type: ClusterType) -> EdgeClusterProvisioner {
        EdgeClusterProvisioner::for_cluster_type(cluster_type, Arc::clone(&self.platform), &self.config)
    }

    /// Store a new edge cluster and provision its workload.
    pub async fn create(
        &self,
        tenant_id: &str,
        spec: NewEdgeCluster,
        cancel: &CancellationToken,
    ) -> EdgeResult<EdgeClusterId> {
        require("tenant_id", tenant_id)?;
        validate_fields(&spec.name, &spec.cluster_secret)?;

        let cluster_type = spec.cluster_type;
        let secret = spec.cluster_secret.clone();
        let id = self.repo.create(tenant_id, spec, cancel).await?;

        self.provisioner(cluster_type)
            .new_provision(&id, &secret, None, cancel)
            .await
            .map_err(|e| {
                error!(%tenant_id, %id, error = %e, "edge cluster stored but not provisioned");
                EdgeError::provisioning("provisioning", &id, e)
            })?;

        info!(%tenant_id, %id, %cluster_type, "edge cluster created");
        Ok(id)
    }

    pub async fn read(&self, tenant_id: &str, id: &str, cancel: &CancellationToken) -> EdgeResult<EdgeCluster> {
        require("tenant_id", tenant_id)?;
        require("id", id)?;
        Ok(self.repo.read(tenant_id, id, cancel).await?)
    }

    /// Replace the mutable fields of an edge cluster and roll the secret
    /// into its workload.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        update: EdgeClusterUpdate,
        cancel: &CancellationToken,
    ) -> EdgeResult<EdgeCluster> {
        require("tenant_id", tenant_id)?;
        require("id", id)?;
        validate_fields(&update.name, &update.cluster_secret)?;

        let updated = self.repo.update(tenant_id, id, update, cancel).await?;

        self.provisioner(updated.cluster_type)
            .update_provision_with_retry(id, &updated.cluster_secret, None, cancel)
            .await
            .map_err(|e| {
                error!(%tenant_id, %id, error = %e, "edge cluster updated but workload not converged");
                EdgeError::provisioning("update", id, e)
            })?;

        info!(%tenant_id, %id, "edge cluster updated");
        Ok(updated)
    }

    /// Remove an edge cluster and tear down its workload.
    pub async fn delete(&self, tenant_id: &str, id: &str, cancel: &CancellationToken) -> EdgeResult<()> {
        require("tenant_id", tenant_id)?;
        require("id", id)?;

        let removed = self.repo.delete(tenant_id, id, cancel).await?;

        self.provisioner(removed.cluster_type)
            .delete_provision(id, None, cancel)
            .await
            .map_err(|e| {
                error!(%tenant_id, %id, error = %e, "edge cluster removed but workload not torn down");
                EdgeError::provisioning("teardown", id, e)
            })?;

        info!(%tenant_id, %id, "edge cluster deleted");
        Ok(())
    }

    pub async fn search(&self, query: &SearchQuery, cancel: &CancellationToken) -> EdgeResult<Page> {
        require("tenant_id", &query.tenant_id)?;
        Ok(self.search.search(query, cancel).await?)
    }
}

fn require(name: &'static str, value: &str) -> EdgeResult<()> {
    if value.is_empty() {
        return Err(EdgeError::ArgumentNil { name });
    }
    Ok(())
}

fn validate_fields(name: &str, cluster_secret: &str) -> EdgeResult<()> {
    require("name", name)?;
    require("cluster_secret", cluster_secret)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(EdgeError::ArgumentInvalid {
            name: "name",
            reason: format!("must be at most {MAX_NAME_LEN} characters"),
        });
    }
    if cluster_secret.chars().any(char::is_whitespace) {
        return Err(EdgeError::ArgumentInvalid {
            name: "cluster_secret",
            reason: "must not contain whitespace".to_string(),
        });
    }
    Ok(())
}
