//! NodeRegistry — node lifecycle bookkeeping for the cluster core.
//!
//! Transitions allowed:
//!
//! ```text
//! free ──set_busy──▶ busy ──free_node──▶ free
//!   └─────────set_down (from any state)──────▶ down
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use rmgrid_core::{ClusterCore, NodeHandle, NodeId, NodeState, StateError, StateResult};

struct Entry {
    handle: NodeHandle,
    state: NodeState,
}

#[derive(Default)]
struct Inner {
    /// Registration order, so free-pool snapshots are deterministic.
    order: Vec<NodeId>,
    entries: HashMap<NodeId, Entry>,
}

/// Thread-safe in-memory node registry.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StateResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StateError::LockPoisoned)
    }

    fn write(&self) -> StateResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StateError::LockPoisoned)
    }

    /// Register a node as free.
    pub fn add_node(&self, handle: NodeHandle) -> StateResult<()> {
        let id = handle.id().clone();
        let mut inner = self.write()?;
        if inner.entries.contains_key(&id) {
            return Err(StateError::AlreadyRegistered(id));
        }
        inner.order.push(id.clone());
        inner.entries.insert(
            id.clone(),
            Entry {
                handle,
                state: NodeState::Free,
            },
        );
        info!(node = %id, "node registered");
        Ok(())
    }

    /// Forget a node. Returns true if it was registered.
    pub fn remove_node(&self, node: &NodeId) -> StateResult<bool> {
        let mut inner = self.write()?;
        let existed = inner.entries.remove(node).is_some();
        if existed {
            inner.order.retain(|id| id != node);
            info!(%node, "node removed");
        }
        Ok(existed)
    }

    pub fn state_of(&self, node: &NodeId) -> StateResult<Option<NodeState>> {
        Ok(self.read()?.entries.get(node).map(|e| e.state))
    }

    /// Number of nodes currently in `state`.
    pub fn count(&self, state: NodeState) -> StateResult<usize> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.state == state)
            .count())
    }

    pub fn len(&self) -> StateResult<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> StateResult<bool> {
        Ok(self.len()? == 0)
    }

    fn transition(
        &self,
        node: &NodeId,
        allowed_from: &[NodeState],
        to: NodeState,
    ) -> StateResult<()> {
        let mut inner = self.write()?;
        let entry = inner
            .entries
            .get_mut(node)
            .ok_or_else(|| StateError::UnknownNode(node.clone()))?;
        if !allowed_from.contains(&entry.state) {
            return Err(StateError::InvalidTransition {
                node: node.clone(),
                from: entry.state,
                to,
            });
        }
        let from = entry.state;
        entry.state = to;
        debug!(%node, %from, %to, "node state changed");
        Ok(())
    }
}

impl ClusterCore for NodeRegistry {
    fn free_nodes(&self) -> StateResult<Vec<NodeHandle>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .filter(|e| e.state == NodeState::Free)
            .map(|e| e.handle.clone())
            .collect())
    }

    fn is_free(&self, node: &NodeId) -> StateResult<bool> {
        Ok(self
            .read()?
            .entries
            .get(node)
            .is_some_and(|e| e.state == NodeState::Free))
    }

    fn set_busy(&self, node: &NodeId) -> StateResult<()> {
        self.transition(node, &[NodeState::Free], NodeState::Busy)
    }

    fn set_down(&self, node: &NodeId) -> StateResult<()> {
        self.transition(
            node,
            &[NodeState::Free, NodeState::Busy, NodeState::Down],
            NodeState::Down,
        )
    }

    fn free_node(&self, node: &NodeId) -> StateResult<()> {
        self.transition(node, &[NodeState::Busy], NodeState::Free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedNode;
    use std::sync::Arc;

    fn registry_with(ids: &[&str]) -> NodeRegistry {
        let registry = NodeRegistry::new();
        for id in ids {
            registry.add_node(Arc::new(SimulatedNode::new(*id))).unwrap();
        }
        registry
    }

    fn ids(nodes: &[NodeHandle]) -> Vec<String> {
        nodes.iter().map(|n| n.id().clone()).collect()
    }

    #[test]
    fn new_nodes_are_free_in_registration_order() {
        let registry = registry_with(&["n3", "n1", "n2"]);
        assert_eq!(ids(&registry.free_nodes().unwrap()), vec!["n3", "n1", "n2"]);
        assert_eq!(registry.count(NodeState::Free).unwrap(), 3);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = registry_with(&["n1"]);
        let err = registry
            .add_node(Arc::new(SimulatedNode::new("n1")))
            .unwrap_err();
        assert!(matches!(err, StateError::AlreadyRegistered(_)));
    }

    #[test]
    fn busy_nodes_leave_the_free_pool() {
        let registry = registry_with(&["n1", "n2"]);
        registry.set_busy(&"n1".to_string()).unwrap();
        assert_eq!(ids(&registry.free_nodes().unwrap()), vec!["n2"]);
        assert_eq!(
            registry.state_of(&"n1".to_string()).unwrap(),
            Some(NodeState::Busy)
        );
    }

    #[test]
    fn busy_node_cannot_be_reserved_twice() {
        let registry = registry_with(&["n1"]);
        registry.set_busy(&"n1".to_string()).unwrap();
        let err = registry.set_busy(&"n1".to_string()).unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidTransition {
                from: NodeState::Busy,
                to: NodeState::Busy,
                ..
            }
        ));
    }

    #[test]
    fn is_free_tracks_state() {
        let registry = registry_with(&["n1"]);
        let n1 = "n1".to_string();
        assert!(registry.is_free(&n1).unwrap());
        registry.set_busy(&n1).unwrap();
        assert!(!registry.is_free(&n1).unwrap());
        assert!(!registry.is_free(&"ghost".to_string()).unwrap());
    }

    #[test]
    fn freeing_returns_node_to_pool() {
        let registry = registry_with(&["n1"]);
        registry.set_busy(&"n1".to_string()).unwrap();
        registry.free_node(&"n1".to_string()).unwrap();
        assert_eq!(registry.count(NodeState::Free).unwrap(), 1);
    }

    #[test]
    fn freeing_a_free_node_fails() {
        let registry = registry_with(&["n1"]);
        assert!(registry.free_node(&"n1".to_string()).is_err());
    }

    #[test]
    fn down_is_reachable_from_any_state() {
        let registry = registry_with(&["n1", "n2"]);
        registry.set_busy(&"n2".to_string()).unwrap();
        registry.set_down(&"n1".to_string()).unwrap();
        registry.set_down(&"n2".to_string()).unwrap();
        assert_eq!(registry.count(NodeState::Down).unwrap(), 2);
        assert!(registry.free_nodes().unwrap().is_empty());
    }

    #[test]
    fn unknown_node_is_an_error() {
        let registry = NodeRegistry::new();
        let err = registry.set_busy(&"ghost".to_string()).unwrap_err();
        assert!(matches!(err, StateError::UnknownNode(_)));
    }

    #[test]
    fn remove_node_forgets_it() {
        let registry = registry_with(&["n1", "n2"]);
        assert!(registry.remove_node(&"n1".to_string()).unwrap());
        assert!(!registry.remove_node(&"n1".to_string()).unwrap());
        assert_eq!(ids(&registry.free_nodes().unwrap()), vec!["n2"]);
        assert_eq!(registry.len().unwrap(), 1);
    }
}
