//! edgegrid-provisioner — materializes edge clusters on a host Kubernetes.
//!
//! Each edge cluster becomes a K3S server workload (Namespace, Deployment,
//! Service). The host is reached through the [`HostPlatform`] trait, with
//! [`KubePlatform`] for real clusters and [`MemoryPlatform`] for local runs
//! and tests.

pub mod error;
pub mod k3s;
pub mod kubernetes;
pub mod manifest;
pub mod memory;
pub mod platform;
pub mod retry;

use std::sync::Arc;

use edgegrid_core::ClusterType;
use edgegrid_core::config::ProvisionerConfig;
use tokio_util::sync::CancellationToken;

pub use error::{PlatformError, PlatformResult, ProvisionError, ProvisionResult};
pub use k3s::K3sProvisioner;
pub use kubernetes::KubePlatform;
pub use memory::MemoryPlatform;
pub use platform::HostPlatform;
pub use retry::RetryPolicy;

/// Provisioner variants, one per supported [`ClusterType`].
#[derive(Clone)]
pub enum EdgeClusterProvisioner {
    K3s(K3sProvisioner),
}

impl EdgeClusterProvisioner {
    pub fn for_cluster_type(
        cluster_type: ClusterType,
        platform: Arc<dyn HostPlatform>,
        config: &ProvisionerConfig,
    ) -> Self {
        match cluster_type {
            ClusterType::K3s => EdgeClusterProvisioner::K3s(K3sProvisioner::new(platform, config)),
        }
    }

    pub fn cluster_type(&self) -> ClusterType {
        match self {
            EdgeClusterProvisioner::K3s(_) => ClusterType::K3s,
        }
    }

    pub async fn new_provision(
        &self,
        edge_cluster_id: &str,
        cluster_secret: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        match self {
            EdgeClusterProvisioner::K3s(k3s) => {
                k3s.new_provision(edge_cluster_id, cluster_secret, namespace, cancel)
                    .await
            }
        }
    }

    pub async fn update_provision_with_retry(
        &self,
        edge_cluster_id: &str,
        cluster_secret: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        match self {
            EdgeClusterProvisioner::K3s(k3s) => {
                k3s.update_provision_with_retry(edge_cluster_id, cluster_secret, namespace, cancel)
                    .await
            }
        }
    }

    pub async fn delete_provision(
        &self,
        edge_cluster_id: &str,
        namespace: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProvisionResult<()> {
        match self {
            EdgeClusterProvisioner::K3s(k3s) => k3s.delete_provision(edge_cluster_id, namespace, cancel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_selects_k3s() {
        let platform = Arc::new(MemoryPlatform::new());
        let provisioner =
            EdgeClusterProvisioner::for_cluster_type(ClusterType::K3s, platform.clone(), &ProvisionerConfig::default());
        assert_eq!(provisioner.cluster_type(), ClusterType::K3s);

        let cancel = CancellationToken::new();
        provisioner.new_provision("01a", "s", None, &cancel).await.unwrap();
        provisioner
            .update_provision_with_retry("01a", "t", None, &cancel)
            .await
            .unwrap();
        provisioner.delete_provision("01a", None, &cancel).await.unwrap();
        assert!(platform.deployment("edge-clusters", "k3s-01a").is_none());
    }
}
