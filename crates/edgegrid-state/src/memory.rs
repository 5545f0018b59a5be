//! In-memory partition store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use edgegrid_core::{EdgeCluster, EdgeClusterId, EdgeClusterUpdate, TenantId};

use crate::error::{StateError, StateResult};
use crate::store::PartitionStore;

type Partition = BTreeMap<EdgeClusterId, EdgeCluster>;

/// Volatile store: one `RwLock`-guarded `BTreeMap` per tenant.
///
/// The outer map lock is held only long enough to find (or create) a
/// partition, so operations on different tenants never wait on each other.
/// Every critical section leaves the map consistent, so a poisoned lock is
/// recovered rather than propagated.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<TenantId, Arc<RwLock<Partition>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, tenant_id: &str) -> Option<Arc<RwLock<Partition>>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.get(tenant_id).cloned()
    }

    fn existing_partition(&self, tenant_id: &str) -> StateResult<Arc<RwLock<Partition>>> {
        self.partition(tenant_id)
            .ok_or_else(|| StateError::TenantNotFound(tenant_id.to_string()))
    }

    fn partition_or_create(&self, tenant_id: &str) -> Arc<RwLock<Partition>> {
        if let Some(partition) = self.partition(tenant_id) {
            return partition;
        }
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(partitions.entry(tenant_id.to_string()).or_default())
    }
}

impl PartitionStore for MemoryStore {
    fn insert(&self, cluster: &EdgeCluster) -> StateResult<()> {
        let partition = self.partition_or_create(&cluster.tenant_id);
        let mut records = partition.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&cluster.id) {
            return Err(StateError::AlreadyExists(cluster.id.clone()));
        }
        records.insert(cluster.id.clone(), cluster.clone());
        Ok(())
    }

    fn get(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster> {
        let partition = self.existing_partition(tenant_id)?;
        let records = partition.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::EdgeClusterNotFound(id.to_string()))
    }

    fn update(&self, tenant_id: &str, id: &str, update: EdgeClusterUpdate) -> StateResult<EdgeCluster> {
        let partition = self.existing_partition(tenant_id)?;
        let mut records = partition.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get_mut(id)
            .ok_or_else(|| StateError::EdgeClusterNotFound(id.to_string()))?;
        record.apply(update);
        Ok(record.clone())
    }

    fn remove(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster> {
        let partition = self.existing_partition(tenant_id)?;
        let mut records = partition.write().unwrap_or_else(PoisonError::into_inner);
        records
            .remove(id)
            .ok_or_else(|| StateError::EdgeClusterNotFound(id.to_string()))
    }

    fn list(&self, tenant_id: &str) -> StateResult<Vec<EdgeCluster>> {
        let Some(partition) = self.partition(tenant_id) else {
            return Ok(Vec::new());
        };
        let records = partition.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }

    fn tenant_exists(&self, tenant_id: &str) -> StateResult<bool> {
        Ok(self.partition(tenant_id).is_some())
    }
}
