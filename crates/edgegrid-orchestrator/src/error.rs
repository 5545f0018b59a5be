//! Business-level error taxonomy.
//!
//! Lower layers raise their own errors; they are folded into [`EdgeError`]
//! here. Anything without a business meaning becomes `Unknown` and keeps
//! the original error as its source.

use edgegrid_provisioner::ProvisionError;
use edgegrid_search::SearchError;
use edgegrid_state::StateError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type EdgeResult<T> = Result<T, EdgeError>;

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: String },

    #[error("edge cluster not found: {id}")]
    EdgeClusterNotFound { id: String },

    #[error("edge cluster already exists")]
    EdgeClusterAlreadyExists,

    #[error("argument {name} is required")]
    ArgumentNil { name: &'static str },

    #[error("argument {name} is invalid: {reason}")]
    ArgumentInvalid { name: &'static str, reason: String },

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        cause: BoxError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl EdgeError {
    pub fn unknown(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        EdgeError::Unknown {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// Wrap a provisioner failure for edge cluster `id`.
    pub fn provisioning(action: &str, id: &str, err: ProvisionError) -> Self {
        match err {
            ProvisionError::Cancelled => EdgeError::Cancelled,
            other => EdgeError::unknown(format!("{action} of edge cluster {id} failed: {other}"), other),
        }
    }
}

impl From<StateError> for EdgeError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::TenantNotFound(tenant_id) => EdgeError::TenantNotFound { tenant_id },
            StateError::EdgeClusterNotFound(id) => EdgeError::EdgeClusterNotFound { id },
            StateError::AlreadyExists(_) => EdgeError::EdgeClusterAlreadyExists,
            StateError::InvalidArgument { name, reason } => EdgeError::ArgumentInvalid { name, reason },
            StateError::Cancelled => EdgeError::Cancelled,
            other => EdgeError::unknown(format!("state store failure: {other}"), other),
        }
    }
}

impl From<SearchError> for EdgeError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidArgument { name, reason } => EdgeError::ArgumentInvalid { name, reason },
            SearchError::State(e) => e.into(),
        }
    }
}
