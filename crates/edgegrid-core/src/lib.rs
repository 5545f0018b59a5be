//! edgegrid-core — shared domain types and configuration for EdgeGrid.
//!
//! Everything here is plain data: the edge-cluster record that the state
//! store persists, the identifiers used to partition it, and the
//! `edgegrid.toml` configuration model consumed by the daemon.

pub mod config;
pub mod types;

pub use config::{ConfigError, EdgeGridConfig};
pub use types::*;
