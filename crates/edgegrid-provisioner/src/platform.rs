//! The host-platform capability the provisioner depends on.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};

#[cfg(test)]
use mockall::automock;

use crate::error::PlatformResult;

/// Kubernetes operations needed to run an edge cluster.
///
/// Implementations translate API failures into [`PlatformError`](crate::PlatformError)
/// classes: 404 → `NotFound`, 409 AlreadyExists → `AlreadyExists`, any
/// other 409 → `Conflict`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostPlatform: Send + Sync {
    async fn get_namespace(&self, name: &str) -> PlatformResult<Namespace>;

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<Namespace>;

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> PlatformResult<Deployment>;

    /// Write back a full Deployment. The object's `resourceVersion` is a
    /// precondition: a stale version fails with `Conflict`.
    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment>;

    /// Foreground-cascading delete. Resolves only once the Deployment and
    /// every Pod it owned are gone.
    async fn delete_deployment(&self, namespace: &str, name: &str) -> PlatformResult<()>;

    async fn create_service(&self, namespace: &str, service: &Service) -> PlatformResult<Service>;

    async fn delete_service(&self, namespace: &str, name: &str) -> PlatformResult<()>;
}
