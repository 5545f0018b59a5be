//! Search error types.

use thiserror::Error;

/// Errors that can occur while evaluating a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("state store error: {0}")]
    State(#[from] edgegrid_state::StateError),
}

pub type SearchResult<T> = Result<T, SearchError>;
