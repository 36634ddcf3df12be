//! Error types shared across rmgrid crates.

use thiserror::Error;

use crate::types::{NodeId, NodeState};

/// Result type alias for cluster core operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors reported by the cluster core when changing node state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("node {node} cannot go from {from} to {to}")]
    InvalidTransition {
        node: NodeId,
        from: NodeState,
        to: NodeState,
    },

    #[error("node already registered: {0}")]
    AlreadyRegistered(NodeId),

    #[error("node registry lock poisoned")]
    LockPoisoned,
}

/// Errors reported by a node when asked to do work.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    /// The request could not be dispatched to the node at all.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The node could not be cleaned after script execution.
    #[error("node clean failed: {0}")]
    Clean(String),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
