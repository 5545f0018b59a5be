//! MemoryPlatform — an in-process stand-in for the Kubernetes API.
//!
//! Keeps objects in maps, enforces `resourceVersion` preconditions on
//! replace, models the Pods a Deployment owns, and records every mutation
//! so callers can assert on ordering. Used by `edged --platform memory`
//! for local development and throughout the test-suite.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::platform::HostPlatform;

/// Platform calls that can have failures injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetNamespace,
    CreateNamespace,
    CreateDeployment,
    GetDeployment,
    ReplaceDeployment,
    DeleteDeployment,
    CreateService,
    DeleteService,
}

type ObjectKey = (String, String);
type ReplaceHook = Box<dyn FnOnce(&mut Deployment) + Send>;

#[derive(Default)]
struct Objects {
    namespaces: BTreeMap<String, Namespace>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    services: BTreeMap<ObjectKey, Service>,
    pods: BTreeMap<ObjectKey, Vec<String>>,
    version: u64,
    events: Vec<String>,
}

impl Objects {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Default)]
struct Faults {
    failures: HashMap<Operation, VecDeque<PlatformError>>,
    stalls: HashSet<Operation>,
    before_replace: Option<ReplaceHook>,
}

/// In-memory host platform.
#[derive(Default)]
pub struct MemoryPlatform {
    objects: Mutex<Objects>,
    faults: Mutex<Faults>,
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &'static str, name: &str) -> PlatformError {
    PlatformError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn already_exists(kind: &'static str, name: &str) -> PlatformError {
    PlatformError::AlreadyExists {
        kind,
        name: name.to_string(),
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fault(&self, op: Operation) -> PlatformResult<()> {
        let stalled = {
            let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
            faults.stalls.remove(&op)
        };
        if stalled {
            debug!(?op, "injected platform stall");
            std::future::pending::<()>().await;
        }
        self.take_failure(op)
    }

    fn take_failure(&self, op: Operation) -> PlatformResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!(?op, error = %err, "injected platform failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    // ── Fault injection ────────────────────────────────────────────

    /// Make the next call to `op` fail with `err`. Queued failures are
    /// consumed in order, one per call.
    pub fn fail_next(&self, op: Operation, err: PlatformError) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.failures.entry(op).or_default().push_back(err);
    }

    /// Make the next call to `op` hang forever, like an API server that
    /// accepted the connection and never answered.
    pub fn stall_next(&self, op: Operation) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.stalls.insert(op);
    }

    /// Simulate another writer: `hook` mutates the stored Deployment (and
    /// bumps its resourceVersion) just before the next replace is checked.
    pub fn before_next_replace(&self, hook: impl FnOnce(&mut Deployment) + Send + 'static) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.before_replace = Some(Box::new(hook));
    }

    // ── Inspection ─────────────────────────────────────────────────

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.objects().namespaces.get(name).cloned()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.objects().deployments.get(&key(namespace, name)).cloned()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.objects().services.get(&key(namespace, name)).cloned()
    }

    /// Pods currently owned by a Deployment.
    pub fn pods(&self, namespace: &str, deployment: &str) -> Vec<String> {
        self.objects()
            .pods
            .get(&key(namespace, deployment))
            .cloned()
            .unwrap_or_default()
    }

    /// Mutations applied so far, e.g. `"create deployment edge/k3s-01a"`.
    pub fn events(&self) -> Vec<String> {
        self.objects().events.clone()
    }
}

#[async_trait]
impl HostPlatform for MemoryPlatform {
    async fn get_namespace(&self, name: &str) -> PlatformResult<Namespace> {
        self.fault(Operation::GetNamespace).await?;
        self.objects()
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("namespace", name))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> PlatformResult<Namespace> {
        self.fault(Operation::CreateNamespace).await?;
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let mut objects = self.objects();
        if objects.namespaces.contains_key(&name) {
            return Err(already_exists("namespace", &name));
        }
        let mut created = namespace.clone();
        created.metadata.resource_version = Some(objects.next_version());
        objects.namespaces.insert(name.clone(), created.clone());
        objects.events.push(format!("create namespace {name}"));
        Ok(created)
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment> {
        self.fault(Operation::CreateDeployment).await?;
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let mut objects = self.objects();
        if !objects.namespaces.contains_key(namespace) {
            return Err(not_found("namespace", namespace));
        }
        let k = key(namespace, &name);
        if objects.deployments.contains_key(&k) {
            return Err(already_exists("deployment", &name));
        }

        let mut created = deployment.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.resource_version = Some(objects.next_version());
        created.metadata.generation = Some(1);

        let replicas = created.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let pods = (0..replicas).map(|i| format!("{name}-{i}")).collect();
        objects.pods.insert(k.clone(), pods);
        objects.deployments.insert(k, created.clone());
        objects.events.push(format!("create deployment {namespace}/{name}"));
        Ok(created)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> PlatformResult<Deployment> {
        self.fault(Operation::GetDeployment).await?;
        self.objects()
            .deployments
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("deployment", name))
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> PlatformResult<Deployment> {
        self.fault(Operation::ReplaceDeployment).await?;
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let hook = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .before_replace
            .take();

        let mut objects = self.objects();
        let k = key(namespace, &name);
        if !objects.deployments.contains_key(&k) {
            return Err(not_found("deployment", &name));
        }

        if let Some(hook) = hook {
            let version = objects.next_version();
            if let Some(stored) = objects.deployments.get_mut(&k) {
                hook(stored);
                stored.metadata.resource_version = Some(version);
            }
            objects.events.push(format!("replace deployment {namespace}/{name} (concurrent writer)"));
        }

        let current_version = objects
            .deployments
            .get(&k)
            .and_then(|d| d.metadata.resource_version.clone());
        if deployment.metadata.resource_version.is_some() && deployment.metadata.resource_version != current_version {
            return Err(PlatformError::Conflict {
                kind: "deployment",
                name,
                message: "the object has been modified; please apply your changes to the latest version".to_string(),
            });
        }

        let mut replaced = deployment.clone();
        replaced.metadata.namespace = Some(namespace.to_string());
        replaced.metadata.resource_version = Some(objects.next_version());
        let generation = objects
            .deployments
            .get(&k)
            .and_then(|d| d.metadata.generation)
            .unwrap_or(1);
        replaced.metadata.generation = Some(generation + 1);
        objects.deployments.insert(k, replaced.clone());
        objects.events.push(format!("replace deployment {namespace}/{name}"));
        Ok(replaced)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> PlatformResult<()> {
        self.fault(Operation::DeleteDeployment).await?;
        let mut objects = self.objects();
        let k = key(namespace, name);
        if !objects.deployments.contains_key(&k) {
            return Err(not_found("deployment", name));
        }
        // Foreground: dependents go first, then the owner.
        for pod in objects.pods.remove(&k).unwrap_or_default() {
            objects.events.push(format!("delete pod {namespace}/{pod}"));
        }
        objects.deployments.remove(&k);
        objects.events.push(format!("delete deployment {namespace}/{name}"));
        Ok(())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> PlatformResult<Service> {
        self.fault(Operation::CreateService).await?;
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut objects = self.objects();
        if !objects.namespaces.contains_key(namespace) {
            return Err(not_found("namespace", namespace));
        }
        let k = key(namespace, &name);
        if objects.services.contains_key(&k) {
            return Err(already_exists("service", &name));
        }
        let mut created = service.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.resource_version = Some(objects.next_version());
        objects.services.insert(k, created.clone());
        objects.events.push(format!("create service {namespace}/{name}"));
        Ok(created)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> PlatformResult<()> {
        self.fault(Operation::DeleteService).await?;
        let mut objects = self.objects();
        if objects.services.remove(&key(namespace, name)).is_none() {
            return Err(not_found("service", name));
        }
        objects.events.push(format!("delete service {namespace}/{name}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest;
    use std::time::Duration;

    #[tokio::test]
    async fn stale_replace_conflicts() {
        let platform = MemoryPlatform::new();
        platform.create_namespace(&manifest::namespace("edge")).await.unwrap();
        let created = platform
            .create_deployment("edge", &manifest::deployment("a", "s", "edge", "img"))
            .await
            .unwrap();

        platform.replace_deployment("edge", &created).await.unwrap();
        let err = platform.replace_deployment("edge", &created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let platform = MemoryPlatform::new();
        platform.fail_next(
            Operation::GetNamespace,
            PlatformError::Api {
                code: 500,
                reason: "InternalError".to_string(),
                message: "etcd unavailable".to_string(),
            },
        );

        assert!(matches!(
            platform.get_namespace("edge").await,
            Err(PlatformError::Api { code: 500, .. })
        ));
        assert!(platform.get_namespace("edge").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn stalled_call_never_resolves() {
        let platform = MemoryPlatform::new();
        platform.stall_next(Operation::GetNamespace);

        let stalled = tokio::time::timeout(Duration::from_millis(50), platform.get_namespace("edge")).await;
        assert!(stalled.is_err());
        assert!(platform.get_namespace("edge").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deployment_requires_namespace() {
        let platform = MemoryPlatform::new();
        let err = platform
            .create_deployment("edge", &manifest::deployment("a", "s", "edge", "img"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
