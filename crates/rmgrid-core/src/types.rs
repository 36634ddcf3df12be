//! Node identity and lifecycle types.

use serde::{Deserialize, Serialize};

/// Stable identity of a node in the cluster (its URL).
pub type NodeId = String;

/// Lifecycle state of a node, owned by the cluster core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Available for selection.
    Free,
    /// Reserved by a request.
    Busy,
    /// Removed from the free pool; cannot be handed to a workload.
    Down,
}

impl NodeState {
    pub fn label(&self) -> &'static str {
        match self {
            NodeState::Free => "free",
            NodeState::Busy => "busy",
            NodeState::Down => "down",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_label() {
        assert_eq!(NodeState::Free.to_string(), "free");
        assert_eq!(NodeState::Busy.to_string(), "busy");
        assert_eq!(NodeState::Down.to_string(), "down");
    }
}
