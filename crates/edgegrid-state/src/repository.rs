//! TenantRepository — async, cancellable front of a [`PartitionStore`].
//!
//! The repository owns ID assignment and argument checks; the injected
//! store owns persistence. Store calls block, so each one runs on the
//! blocking pool and is raced against the caller's cancellation token.

use std::sync::Arc;

use edgegrid_core::{EdgeCluster, EdgeClusterId, EdgeClusterUpdate, NewEdgeCluster};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::id::IdGenerator;
use crate::store::PartitionStore;

/// Tenant-partitioned edge-cluster storage.
#[derive(Clone)]
pub struct TenantRepository {
    store: Arc<dyn PartitionStore>,
    ids: Arc<IdGenerator>,
}

impl TenantRepository {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            store,
            ids: Arc::new(IdGenerator::new()),
        }
    }

    /// Register a new record under `tenant_id` and return its assigned ID.
    pub async fn create(
        &self,
        tenant_id: &str,
        spec: NewEdgeCluster,
        cancel: &CancellationToken,
    ) -> StateResult<EdgeClusterId> {
        check_tenant(tenant_id)?;
        let id = self.ids.next_id()?;
        let cluster = EdgeCluster::new(id.clone(), tenant_id, spec);
        self.run(cancel, "create", move |store| store.insert(&cluster))
            .await?;
        info!(%tenant_id, %id, "edge cluster created");
        Ok(id)
    }

    pub async fn read(
        &self,
        tenant_id: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StateResult<EdgeCluster> {
        check_tenant(tenant_id)?;
        let (tenant_id, id) = (tenant_id.to_string(), id.to_string());
        self.run(cancel, "read", move |store| store.get(&tenant_id, &id))
            .await
    }

    /// Replace the mutable fields of a record; returns the stored record.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        update: EdgeClusterUpdate,
        cancel: &CancellationToken,
    ) -> StateResult<EdgeCluster> {
        check_tenant(tenant_id)?;
        let (tenant, key) = (tenant_id.to_string(), id.to_string());
        let updated = self
            .run(cancel, "update", move |store| store.update(&tenant, &key, update))
            .await?;
        info!(%tenant_id, %id, "edge cluster updated");
        Ok(updated)
    }

    /// Remove a record; returns what was stored.
    pub async fn delete(
        &self,
        tenant_id: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StateResult<EdgeCluster> {
        check_tenant(tenant_id)?;
        let (tenant, key) = (tenant_id.to_string(), id.to_string());
        let removed = self
            .run(cancel, "delete", move |store| store.remove(&tenant, &key))
            .await?;
        info!(%tenant_id, %id, "edge cluster deleted");
        Ok(removed)
    }

    /// Consistent snapshot of one tenant partition, ascending by ID.
    pub async fn list(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> StateResult<Vec<EdgeCluster>> {
        check_tenant(tenant_id)?;
        let tenant_id = tenant_id.to_string();
        self.run(cancel, "list", move |store| store.list(&tenant_id))
            .await
    }

    async fn run<T, F>(&self, cancel: &CancellationToken, op: &'static str, f: F) -> StateResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PartitionStore) -> StateResult<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        let store = Arc::clone(&self.store);
        let guard = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            // The pool may start us late; skip the store call if the caller
            // has already given up.
            if guard.is_cancelled() {
                return Err(StateError::Cancelled);
            }
            f(store.as_ref())
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(op, "store operation cancelled");
                Err(StateError::Cancelled)
            }
            joined = task => joined.map_err(|e| StateError::Task(e.to_string()))?,
        }
    }
}

/// Tenant IDs partition the key space, so they must be non-empty and free
/// of the `/` key separator.
fn check_tenant(tenant_id: &str) -> StateResult<()> {
    if tenant_id.is_empty() {
        return Err(StateError::InvalidArgument {
            name: "tenant_id",
            reason: "must not be empty".to_string(),
        });
    }
    if tenant_id.contains('/') {
        return Err(StateError::InvalidArgument {
            name: "tenant_id",
            reason: "must not contain '/'".to_string(),
        });
    }
    Ok(())
}
