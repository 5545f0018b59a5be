//! The storage contract consumed by [`TenantRepository`](crate::TenantRepository).

use edgegrid_core::{EdgeCluster, EdgeClusterUpdate};

use crate::error::StateResult;

/// Partitioned key-value storage of edge-cluster records.
///
/// Implementations must make every method atomic with respect to other
/// mutations of the same tenant partition, and readers must observe a
/// snapshot that reflects either all or none of any committed write.
/// Methods block; async callers run them on the blocking pool.
pub trait PartitionStore: Send + Sync {
    /// Insert a new record, creating the tenant partition if needed.
    ///
    /// Fails with `AlreadyExists` if the ID is already present in the
    /// partition.
    fn insert(&self, cluster: &EdgeCluster) -> StateResult<()>;

    /// Fetch one record.
    fn get(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster>;

    /// Apply `update` to an existing record and return the stored result.
    fn update(&self, tenant_id: &str, id: &str, update: EdgeClusterUpdate) -> StateResult<EdgeCluster>;

    /// Remove a record and return what was stored.
    fn remove(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster>;

    /// Snapshot of a whole partition in ascending ID order. Unknown tenants
    /// yield an empty list.
    fn list(&self, tenant_id: &str) -> StateResult<Vec<EdgeCluster>>;

    /// Whether the tenant has a partition.
    fn tenant_exists(&self, tenant_id: &str) -> StateResult<bool>;
}
