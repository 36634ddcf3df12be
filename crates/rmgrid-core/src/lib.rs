//! rmgrid-core — shared types for the rmgrid resource manager.
//!
//! Holds the pieces every other crate agrees on: node identities and
//! lifecycle states, selection scripts and their evaluation outcomes,
//! the collaborator traits the admission controller consumes
//! ([`Node`], [`ClusterCore`]), and the `rmgrid.toml` configuration.

pub mod cluster;
pub mod config;
pub mod error;
pub mod node;
pub mod script;
pub mod types;

pub use cluster::ClusterCore;
pub use config::{DispatchMode, RmConfig, SelectionConfig, parse_duration};
pub use error::{ConfigError, NodeError, StateError, StateResult};
pub use node::{BoxFuture, EvaluationFuture, Node, NodeHandle};
pub use script::{ScriptDigest, ScriptOutcome, SelectionScript, content_digest};
pub use types::*;
