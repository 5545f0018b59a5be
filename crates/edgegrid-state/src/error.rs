//! Error types for the EdgeGrid state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("edge cluster not found: {0}")]
    EdgeClusterNotFound(String),

    #[error("edge cluster already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("id generation failed: {0}")]
    IdGeneration(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}
