//! Candidate ranking — orders free nodes by how likely they are to satisfy
//! a request's selection scripts.

use std::collections::HashSet;

use tracing::debug;

use rmgrid_core::{NodeHandle, NodeId, SelectionScript};

use crate::knowledge::KnowledgeBase;

/// A candidate node with its combined confidence.
#[derive(Debug, Clone)]
pub struct RankedNode {
    pub node: NodeHandle,
    pub confidence: f64,
}

/// Arrange free nodes for script evaluation, best first.
///
/// Excluded nodes are dropped. Without scripts the remaining nodes come
/// back in input order. With scripts, nodes known to fail any script are
/// dropped and the rest are sorted by descending combined confidence;
/// ties keep their input order.
pub async fn arrange(
    free: Vec<NodeHandle>,
    exclusions: &HashSet<NodeId>,
    scripts: &[SelectionScript],
    knowledge: &KnowledgeBase,
) -> Vec<NodeHandle> {
    rank(free, exclusions, scripts, knowledge)
        .await
        .into_iter()
        .map(|r| r.node)
        .collect()
}

/// Like [`arrange`], keeping each node's confidence.
pub async fn rank(
    free: Vec<NodeHandle>,
    exclusions: &HashSet<NodeId>,
    scripts: &[SelectionScript],
    knowledge: &KnowledgeBase,
) -> Vec<RankedNode> {
    let candidates = free
        .into_iter()
        .filter(|n| !exclusions.contains(n.id()));

    if scripts.is_empty() {
        return candidates
            .map(|node| RankedNode {
                node,
                confidence: 1.0,
            })
            .collect();
    }

    let mut ranked = Vec::new();
    for node in candidates {
        match knowledge.combined_confidence(node.id(), scripts).await {
            Some(confidence) => ranked.push(RankedNode { node, confidence }),
            None => debug!(node = %node.id(), "skipping node known to fail a script"),
        }
    }

    // `sort_by` is stable, so equal confidences keep input order.
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}
