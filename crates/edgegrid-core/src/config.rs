//! edgegrid.toml configuration parser.
//!
//! Every section is optional; omitted fields fall back to the defaults
//! below, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace that hosts provisioned edge clusters when none is configured.
pub const DEFAULT_NAMESPACE: &str = "edge-clusters";

/// Container image for the K3S control plane.
pub const DEFAULT_K3S_IMAGE: &str = "rancher/k3s:v1.31.4-k3s1";

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EdgeGridConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub provisioner: ProvisionerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Deadline applied to every API request.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    #[default]
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the redb backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redb,
            path: PathBuf::from("/var/lib/edgegrid/edgegrid.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Namespace shared by all provisioned clusters.
    pub namespace: String,
    pub image: String,
    /// Also delete the cluster's Service on teardown. Off by default; the
    /// Service is otherwise left behind.
    pub delete_service: bool,
    /// Upper bound on waiting for a foreground delete to finish.
    pub delete_timeout_secs: u64,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            image: DEFAULT_K3S_IMAGE.to_string(),
            delete_service: false,
            delete_timeout_secs: 120,
        }
    }
}

impl EdgeGridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EdgeGridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_dns_label(&self.provisioner.namespace) {
            return Err(ConfigError::Invalid(format!(
                "provisioner.namespace '{}' is not a valid DNS-1123 label",
                self.provisioner.namespace
            )));
        }
        if self.provisioner.image.trim().is_empty() {
            return Err(ConfigError::Invalid("provisioner.image must not be empty".to_string()));
        }
        if self.provisioner.delete_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provisioner.delete_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// True if `value` is a valid RFC 1123 label (namespace names, object names).
pub fn is_dns_label(value: &str) -> bool {
    DNS_LABEL.is_match(value)
}
