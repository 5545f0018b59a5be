//! redb table definitions for the EdgeGrid state store.

use redb::TableDefinition;

/// Edge-cluster records (JSON) keyed by `{tenant_id}/{edge_cluster_id}`.
pub const EDGE_CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("edge_clusters");

/// Tenants that own a partition, keyed by `{tenant_id}`.
pub const TENANTS: TableDefinition<&str, ()> = TableDefinition::new("tenants");
