//! Provisioner error types.

use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// A failed call against the host platform API, classified by the
/// handling it needs.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// The write was based on a stale resourceVersion.
    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("host platform rejected request ({code} {reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("kubernetes client error: {0}")]
    Client(#[source] kube::Error),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, PlatformError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PlatformError::Conflict { .. })
    }
}

/// Errors surfaced by provisioner operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("deployment {0} has no k3s container")]
    MissingContainer(String),

    #[error("gave up on {name} after {attempts} conflicting writes")]
    ConflictRetriesExhausted {
        name: String,
        attempts: u32,
        #[source]
        last: PlatformError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl ProvisionError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProvisionError::Platform(e) if e.is_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvisionError::Platform(e) if e.is_not_found())
    }
}
