//! Domain types for edge clusters.
//!
//! An [`EdgeCluster`] is the logical record owned by the state store. Its
//! physical counterpart (namespace, deployment, service) lives on the host
//! platform and is owned by the provisioner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a tenant partition.
pub type TenantId = String;

/// Store-assigned identifier of an edge cluster. Also used verbatim as the
/// pagination cursor, so callers must treat it as opaque.
pub type EdgeClusterId = String;

// ── Cluster type ──────────────────────────────────────────────────

/// Kind of control plane an edge cluster is provisioned as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    #[default]
    K3s,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::K3s => "k3s",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown cluster type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cluster type: {0}")]
pub struct UnknownClusterType(pub String);

impl FromStr for ClusterType {
    type Err = UnknownClusterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "k3s" => Ok(ClusterType::K3s),
            other => Err(UnknownClusterType(other.to_string())),
        }
    }
}

// ── Edge cluster ──────────────────────────────────────────────────

/// A registered edge cluster.
///
/// `id` and `tenant_id` are fixed at creation; `name` and
/// `cluster_secret` may change through updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCluster {
    pub id: EdgeClusterId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Shared secret handed to the provisioned control plane.
    pub cluster_secret: String,
    pub cluster_type: ClusterType,
}

/// Caller-supplied fields for registering a new edge cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEdgeCluster {
    pub name: String,
    pub cluster_secret: String,
    #[serde(default)]
    pub cluster_type: ClusterType,
}

/// The mutable subset of an edge cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeClusterUpdate {
    pub name: String,
    pub cluster_secret: String,
}

impl EdgeCluster {
    /// Materialize a record from its assigned identity and the caller's fields.
    pub fn new(id: impl Into<EdgeClusterId>, tenant_id: impl Into<TenantId>, spec: NewEdgeCluster) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: spec.name,
            cluster_secret: spec.cluster_secret,
            cluster_type: spec.cluster_type,
        }
    }

    /// Apply an update. Identity fields are never touched.
    pub fn apply(&mut self, update: EdgeClusterUpdate) {
        self.name = update.name;
        self.cluster_secret = update.cluster_secret;
    }

    /// Composite key used by persistent backends: `{tenant_id}/{id}`.
    pub fn table_key(&self) -> String {
        record_key(&self.tenant_id, &self.id)
    }
}

/// Build the composite `{tenant_id}/{id}` key.
pub fn record_key(tenant_id: &str, id: &str) -> String {
    format!("{tenant_id}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> NewEdgeCluster {
        NewEdgeCluster {
            name: "factory-floor".to_string(),
            cluster_secret: "s3cret".to_string(),
            cluster_type: ClusterType::K3s,
        }
    }

    #[test]
    fn apply_keeps_identity() {
        let mut cluster = EdgeCluster::new("01j0", "acme", spec());
        cluster.apply(EdgeClusterUpdate {
            name: "warehouse".to_string(),
            cluster_secret: "rotated".to_string(),
        });

        assert_eq!(cluster.id, "01j0");
        assert_eq!(cluster.tenant_id, "acme");
        assert_eq!(cluster.name, "warehouse");
        assert_eq!(cluster.cluster_secret, "rotated");
    }

    #[test]
    fn cluster_type_parses_case_insensitively() {
        assert_eq!("K3S".parse::<ClusterType>().unwrap(), ClusterType::K3s);
        assert!("rke2".parse::<ClusterType>().is_err());
    }

    #[test]
    fn cluster_type_defaults_when_omitted() {
        let parsed: NewEdgeCluster =
            serde_json::from_str(r#"{"name":"a","cluster_secret":"b"}"#).unwrap();
        assert_eq!(parsed.cluster_type, ClusterType::K3s);
    }

    #[test]
    fn table_key_is_tenant_scoped() {
        let cluster = EdgeCluster::new("01j0", "acme", spec());
        assert_eq!(cluster.table_key(), "acme/01j0");
    }
}
