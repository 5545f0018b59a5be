//! edgegrid-orchestrator — business-level sequencing for edge clusters.
//!
//! ```text
//! EdgeClusterService
//!   ├── TenantRepository   (source of truth for the record)
//!   ├── SearchEngine       (read-only queries)
//!   └── EdgeClusterProvisioner, chosen per ClusterType
//! ```

pub mod error;
pub mod service;

pub use error::{EdgeError, EdgeResult};
pub use service::EdgeClusterService;
