//! RedbStore — redb-backed persistence for edge-cluster records.
//!
//! Records are JSON-serialized into the `edge_clusters` table under
//! `{tenant_id}/{id}` keys, so a tenant partition is a contiguous key range.
//! Known tenants are tracked in a separate table so that an emptied
//! partition still exists. redb serializes write transactions and gives
//! readers MVCC snapshots, which provides per-partition linearizability.

use std::path::Path;
use std::sync::Arc;

use edgegrid_core::{record_key, EdgeCluster, EdgeClusterUpdate};
use redb::{Database, ReadableDatabase, ReadableTable, Table};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::PartitionStore;
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe partition store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory redb database (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(EDGE_CLUSTERS).map_err(map_err!(Table))?;
        txn.open_table(TENANTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` in a write transaction after checking the tenant exists.
    fn modify<T>(
        &self,
        tenant_id: &str,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> StateResult<T>,
    ) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let result = {
            let tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
            if tenants.get(tenant_id).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::TenantNotFound(tenant_id.to_string()));
            }
            let mut table = txn.open_table(EDGE_CLUSTERS).map_err(map_err!(Table))?;
            f(&mut table)?
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(result)
    }
}

fn decode(bytes: &[u8]) -> StateResult<EdgeCluster> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn encode(cluster: &EdgeCluster) -> StateResult<Vec<u8>> {
    serde_json::to_vec(cluster).map_err(map_err!(Serialize))
}

/// Key range `[{tenant}/, {tenant}0)` covering exactly one partition.
fn partition_bounds(tenant_id: &str) -> (String, String) {
    (format!("{tenant_id}/"), format!("{tenant_id}0"))
}

impl PartitionStore for RedbStore {
    fn insert(&self, cluster: &EdgeCluster) -> StateResult<()> {
        let key = cluster.table_key();
        let value = encode(cluster)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
            tenants
                .insert(cluster.tenant_id.as_str(), ())
                .map_err(map_err!(Write))?;

            let mut table = txn.open_table(EDGE_CLUSTERS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(cluster.id.clone()));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "edge cluster stored");
        Ok(())
    }

    fn get(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        if tenants.get(tenant_id).map_err(map_err!(Read))?.is_none() {
            return Err(StateError::TenantNotFound(tenant_id.to_string()));
        }
        let table = txn.open_table(EDGE_CLUSTERS).map_err(map_err!(Table))?;
        match table.get(record_key(tenant_id, id).as_str()).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value()),
            None => Err(StateError::EdgeClusterNotFound(id.to_string())),
        }
    }

    fn update(&self, tenant_id: &str, id: &str, update: EdgeClusterUpdate) -> StateResult<EdgeCluster> {
        let key = record_key(tenant_id, id);
        let updated = self.modify(tenant_id, |table| {
            let mut cluster = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::EdgeClusterNotFound(id.to_string())),
            };
            cluster.apply(update);
            let value = encode(&cluster)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            Ok(cluster)
        })?;
        debug!(%key, "edge cluster updated");
        Ok(updated)
    }

    fn remove(&self, tenant_id: &str, id: &str) -> StateResult<EdgeCluster> {
        let key = record_key(tenant_id, id);
        let removed = self.modify(tenant_id, |table| {
            match table.remove(key.as_str()).map_err(map_err!(Write))? {
                Some(guard) => decode(guard.value()),
                None => Err(StateError::EdgeClusterNotFound(id.to_string())),
            }
        })?;
        debug!(%key, "edge cluster deleted");
        Ok(removed)
    }

    fn list(&self, tenant_id: &str) -> StateResult<Vec<EdgeCluster>> {
        let (start, end) = partition_bounds(tenant_id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EDGE_CLUSTERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    fn tenant_exists(&self, tenant_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        Ok(tenants.get(tenant_id).map_err(map_err!(Read))?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegrid_core::{ClusterType, NewEdgeCluster};

    fn cluster(tenant: &str, id: &str) -> EdgeCluster {
        EdgeCluster::new(
            id,
            tenant,
            NewEdgeCluster {
                name: format!("cluster-{id}"),
                cluster_secret: "secret".to_string(),
                cluster_type: ClusterType::K3s,
            },
        )
    }

    // ── CRUD ───────────────────────────────────────────────────────

    #[test]
    fn insert_and_get() {
        let store = RedbStore::open_in_memory().unwrap();
        let record = cluster("acme", "01a");

        store.insert(&record).unwrap();
        assert_eq!(store.get("acme", "01a").unwrap(), record);
    }

    #[test]
    fn get_unknown_tenant() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get("nobody", "01a"),
            Err(StateError::TenantNotFound(t)) if t == "nobody"
        ));
    }

    #[test]
    fn get_unknown_id() {
        let store = RedbStore::open_in_memory().unwrap();
        store.insert(&cluster("acme", "01a")).unwrap();
        assert!(matches!(
            store.get("acme", "01b"),
            Err(StateError::EdgeClusterNotFound(id)) if id == "01b"
        ));
    }

    #[test]
    fn update_replaces_mutable_fields() {
        let store = RedbStore::open_in_memory().unwrap();
        store.insert(&cluster("acme", "01a")).unwrap();

        let updated = store
            .update(
                "acme",
                "01a",
                EdgeClusterUpdate {
                    name: "renamed".to_string(),
                    cluster_secret: "rotated".to_string(),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "renamed");

        let stored = store.get("acme", "01a").unwrap();
        assert_eq!(stored.cluster_secret, "rotated");
        assert_eq!(stored.tenant_id, "acme");
    }

    #[test]
    fn remove_returns_record_and_keeps_partition() {
        let store = RedbStore::open_in_memory().unwrap();
        store.insert(&cluster("acme", "01a")).unwrap();

        let removed = store.remove("acme", "01a").unwrap();
        assert_eq!(removed.id, "01a");
        assert!(store.tenant_exists("acme").unwrap());
        assert!(matches!(
            store.remove("acme", "01a"),
            Err(StateError::EdgeClusterNotFound(_))
        ));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = RedbStore::open_in_memory().unwrap();
        store.insert(&cluster("acme", "01a")).unwrap();
        assert!(matches!(
            store.insert(&cluster("acme", "01a")),
            Err(StateError::AlreadyExists(_))
        ));
    }

    // ── Partitions ─────────────────────────────────────────────────

    #[test]
    fn list_scans_only_one_partition() {
        let store = RedbStore::open_in_memory().unwrap();
        store.insert(&cluster("acme", "01b")).unwrap();
        store.insert(&cluster("acme", "01a")).unwrap();
        // Shares a prefix with "acme" but is a different tenant.
        store.insert(&cluster("acme-west", "01c")).unwrap();

        let ids: Vec<_> = store.list("acme").unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["01a", "01b"]);
        assert!(store.list("unknown").unwrap().is_empty());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = RedbStore::open(&db_path).unwrap();
            store.insert(&cluster("acme", "01a")).unwrap();
            store.remove("acme", "01a").unwrap();
            store.insert(&cluster("acme", "01b")).unwrap();
        }

        let store = RedbStore::open(&db_path).unwrap();
        assert_eq!(store.get("acme", "01b").unwrap().name, "cluster-01b");
        assert_eq!(store.list("acme").unwrap().len(), 1);
    }
}
