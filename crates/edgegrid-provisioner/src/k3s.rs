//! K3sProvisioner — runs each edge cluster as a K3S server Deployment.
//!
//! Lifecycle on the host platform:
//!
//! ```text
//!   Absent ──new_provision──▶ Provisioning ──▶ Running
//!                                               │   ▲
//!                         update_provision ─────┤   └── Updating
//!                                               ▼
//!                         delete_provision ─▶ Deleting ──▶ Absent
//! ```

use std::future::Future;
use std::sync::Arc;

use edgegrid_core::config::ProvisionerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PlatformResult, ProvisionError, ProvisionResult};
use crate::manifest;
use crate::platform::HostPlatform;
use crate::retry::{RetryPolicy, retry_on_conflict};

#[derive(Clone)]
pub struct K3sProvisioner {
    platform: Arc<dyn HostPlatform>,
    namespace: String,
    image: String,
    delete_service: bool,
    retry: RetryPolicy,
}

/// Race a platform call against cancellation.
async fn guarded<T>(cancel: &CancellationToken, call: impl Future<Output = PlatformResult<T>>) -> ProvisionResult<T> {
    if cancel.is_cancelled() {
        return Err(ProvisionError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProvisionError::Cancelled),
        result = call => result.map_err(ProvisionError::from),
    }
}

impl K3sProvisioner {
    pub fn new(platform: Arc<dyn HostPlatform>, config: &ProvisionerConfig) -> Self {
        Self {
            platform,
            namespace: config.namespace.clone(),
            image: config.image.clone(),
            delete_service: config.delete_service,
            retry: RetryPolicy::default(),
        }
    }

    fn namespace_or_default<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.namespace)
    }

    /// Get the namespace, creating it when absent. Losing a creation race
    /// to another caller still counts as success.
    async fn ensure_namespace(&self, namespace: &str, cancel: &CancellationToken) -> ProvisionResult<()> {
        match guarded(cancel, self.platform.get_namespace(namespace)).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        match guarded(cancel, self.platform.create_namespace(&manifest::namespace(namespace))).await {
            Ok(_) => {
                info!(%namespace, "namespace created");
                Ok(())
            }
            Err(ProvisionError::Platform(e)) if e.is_already_exists() => {
                debug!(%namespace, "namespace created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Create the namespace (if needed), Deployment and Service for a new
    /// edge cluster. Fails with `AlreadyExists` when the workload is
    /// already present.
    pub async fn new_provision(
        &self,
        edge_cluster_id: &str,
        cluster_secret: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        let namespace = self.namespace_or_default(namespace);
        self.ensure_namespace(namespace, cancel).await?;

        let deployment = manifest::deployment(edge_cluster_id, cluster_secret, namespace, &self.image);
        guarded(cancel, self.platform.create_deployment(namespace, &deployment)).await?;
        debug!(%edge_cluster_id, %namespace, "deployment created");

        let service = manifest::service(edge_cluster_id, namespace);
        guarded(cancel, self.platform.create_service(namespace, &service)).await?;

        info!(%edge_cluster_id, %namespace, image = %self.image, "k3s workload provisioned");
        Ok(())
    }

    /// Roll a new cluster secret into the Deployment, re-reading and
    /// reapplying on write conflicts. `namespace` must match the one given
    /// to `new_provision`.
    pub async fn update_provision_with_retry(
        &self,
        edge_cluster_id: &str,
        cluster_secret: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        let name = manifest::workload_name(edge_cluster_id);
        let name = name.as_str();
        let namespace = self.namespace_or_default(namespace);

        retry_on_conflict(&self.retry, name, cancel, || async move {
            let mut deployment = guarded(cancel, self.platform.get_deployment(namespace, name))
                .await
                .inspect_err(|e| warn!(%edge_cluster_id, %namespace, error = %e, "could not fetch deployment"))?;

            if !manifest::set_cluster_secret(&mut deployment, cluster_secret) {
                return Err(ProvisionError::MissingContainer(name.to_string()));
            }

            guarded(cancel, self.platform.replace_deployment(namespace, &deployment)).await?;
            Ok(())
        })
        .await?;

        info!(%edge_cluster_id, %namespace, "cluster secret updated");
        Ok(())
    }

    /// Foreground-delete the Deployment; returns once it and its Pods are
    /// gone. The namespace is shared and always kept. The Service is
    /// removed only when `delete_service` is configured.
    pub async fn delete_provision(
        &self,
        edge_cluster_id: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        let name = manifest::workload_name(edge_cluster_id);
        let namespace = self.namespace_or_default(namespace);

        guarded(cancel, self.platform.delete_deployment(namespace, &name)).await?;
        info!(%edge_cluster_id, %namespace, "deployment deleted");

        if self.delete_service {
            match guarded(cancel, self.platform.delete_service(namespace, &name)).await {
                Ok(()) => debug!(%edge_cluster_id, %namespace, "service deleted"),
                Err(e) if e.is_not_found() => debug!(%edge_cluster_id, %namespace, "service already absent"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
