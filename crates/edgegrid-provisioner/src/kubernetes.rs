//! [`HostPlatform`] backed by the Kubernetes API via kube-rs.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::Client;
use tracing::{debug, info};

use crate::error::{PlatformError, PlatformResult};
use crate::platform::HostPlatform;

/// Real Kubernetes client implementation.
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    delete_timeout: Duration,
}

impl KubePlatform {
    pub fn new(client: Client, delete_timeout: Duration) -> Self {
        Self {
            client,
            delete_timeout,
        }
    }

    /// Connect using the in-cluster service account or the local kubeconfig.
    pub async fn try_default(delete_timeout: Duration) -> PlatformResult<Self> {
        let client = Client::try_default().await.map_err(PlatformError::Client)?;
        Ok(Self::new(client, delete_timeout))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map a kube error onto the platform taxonomy.
fn classify(kind: &'static str, name: &str, err: kube::Error) -> PlatformError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => PlatformError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            PlatformError::AlreadyExists {
                kind,
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => PlatformError::Conflict {
            kind,
            name: name.to_string(),
            message: ae.message,
        },
        kube::Error::Api(ae) => PlatformError::Api {
            code: ae.code,
            reason: ae.reason,
            message: ae.message,
        },
        other => PlatformError::Client(other),
    }
}

fn object_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

#[async_trait]
impl HostPlatform for KubePlatform {
    async fn get_namespace(&self, name: &str) -> PlatformResult<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get(name).await.map_err(|e| classify("namespace", name, e))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<Namespace> {
        let name = object_name(&namespace.metadata);
        let api: Api<Namespace> = Api::all(self.client.clone());
        let created = api
            .create(&PostParams::default(), namespace)
            .await
            .map_err(|e| classify("namespace", name, e))?;
        info!(namespace = %name, "namespace created");
        Ok(created)
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment> {
        let name = object_name(&deployment.metadata);
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(|e| classify("deployment", name, e))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> PlatformResult<Deployment> {
        self.deployments(namespace)
            .get(name)
            .await
            .map_err(|e| classify("deployment", name, e))
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment> {
        let name = object_name(&deployment.metadata);
        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .map_err(|e| classify("deployment", name, e))
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> PlatformResult<()> {
        let api = self.deployments(namespace);
        let outcome = api
            .delete(name, &DeleteParams::foreground())
            .await
            .map_err(|e| classify("deployment", name, e))?;

        // Right(status) means the object was removed synchronously.
        let Some(uid) = outcome.left().and_then(|d| d.metadata.uid) else {
            debug!(%namespace, deployment = %name, "deployment removed immediately");
            return Ok(());
        };

        debug!(%namespace, deployment = %name, "waiting for foreground deletion");
        let deleted = await_condition(api, name, conditions::is_deleted(&uid));
        match tokio::time::timeout(self.delete_timeout, deleted).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(PlatformError::Api {
                code: 0,
                reason: "WatchFailed".to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PlatformError::Timeout(format!("deletion of deployment {name}"))),
        }
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> PlatformResult<Service> {
        let name = object_name(&service.metadata);
        self.services(namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| classify("service", name, e))
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> PlatformResult<()> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify("service", name, e))?;
        Ok(())
    }
}
