//! The cluster core collaborator — owner of node lifecycle state.

use crate::error::StateResult;
use crate::node::{Node, NodeHandle};
use crate::types::NodeId;

/// Node pool and lifecycle transitions consumed by the admission controller.
pub trait ClusterCore: Send + Sync {
    /// Snapshot of the nodes currently free, in registration order.
    fn free_nodes(&self) -> StateResult<Vec<NodeHandle>>;

    /// Whether `node` is currently free. Unknown nodes are not free.
    fn is_free(&self, node: &NodeId) -> StateResult<bool> {
        Ok(self.free_nodes()?.iter().any(|n| n.id() == node))
    }

    /// Reserve a free node.
    fn set_busy(&self, node: &NodeId) -> StateResult<()>;

    /// Remove a node from the free pool because it cannot be used.
    fn set_down(&self, node: &NodeId) -> StateResult<()>;

    /// Return a reserved node to the free pool.
    fn free_node(&self, node: &NodeId) -> StateResult<()>;
}
