//! Admission control error types.

use thiserror::Error;

use rmgrid_core::{ConfigError, NodeId, StateError};

/// Errors that abort a node selection request.
///
/// Rejected nodes are never errors; a request may simply return fewer
/// nodes than asked for.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("selection script failed to execute on {node}: {message}")]
    Execution { node: NodeId, message: String },

    #[error("script is not authorized: {digest}")]
    Unauthorized { digest: String },

    #[error("failed to load authorized scripts: {0}")]
    AuthorizedScripts(#[source] std::io::Error),

    #[error("cluster state error: {0}")]
    State(#[from] StateError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type SelectionResult<T> = Result<T, SelectionError>;
