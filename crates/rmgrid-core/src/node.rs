//! The node collaborator — a remote execution environment that can run
//! selection scripts, be cleaned afterwards, and be pinged.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::NodeError;
use crate::script::{ScriptOutcome, SelectionScript};
use crate::types::NodeId;

/// Boxed, `Send` future returned by node operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pending result of a dispatched script evaluation.
///
/// Owns everything it needs, so the caller may abandon it on timeout
/// without the node noticing.
pub type EvaluationFuture = BoxFuture<'static, ScriptOutcome>;

/// Shared handle to a node.
pub type NodeHandle = Arc<dyn Node>;

/// A compute node as seen by the admission controller.
pub trait Node: Debug + Send + Sync {
    /// Stable identity (URL) of the node.
    fn id(&self) -> &NodeId;

    /// Dispatch a script for evaluation.
    ///
    /// Returns `Err` when the request cannot be handed to the node at all;
    /// otherwise a future resolving to the script's outcome.
    fn evaluate(&self, script: &SelectionScript) -> Result<EvaluationFuture, NodeError>;

    /// Restore the node to a clean state after script execution.
    fn clean(&self) -> BoxFuture<'_, Result<(), NodeError>>;

    /// Liveness probe. Side effects only; callers do not wait on it.
    fn ping(&self) -> BoxFuture<'_, ()>;
}
