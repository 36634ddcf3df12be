//! AdmissionController — finds, evaluates, and reserves nodes for a request.
//!
//! A request asks for `count` nodes satisfying a list of selection
//! scripts. The controller ranks the free pool using the knowledge base,
//! then evaluates candidates in waves: each wave takes as many untried
//! candidates as nodes are still missing and runs one evaluator per node.
//! Accepted nodes are reserved immediately. If any evaluator reports an
//! execution error, every reservation made by the request is rolled back
//! and the error is returned.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use rmgrid_core::{
    ClusterCore, DispatchMode, NodeHandle, NodeId, SelectionConfig, SelectionScript,
};

use crate::authorization::ScriptAuthorizer;
use crate::error::{SelectionError, SelectionResult};
use crate::evaluator::{Evaluation, PredicateEvaluator, Rejection, Verdict};
use crate::knowledge::KnowledgeBase;
use crate::ranking;

/// Per-request counters, reported in the summary log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub requested: usize,
    /// Size of the free pool when the request started.
    pub free: usize,
    /// Nodes left after exclusions and known failures.
    pub candidates: usize,
    pub waves: usize,
    pub evaluated: usize,
    pub accepted: usize,
    pub failed: usize,
    pub suspect: usize,
    pub timed_out: usize,
    pub unclean: usize,
    /// Candidates skipped because another request was evaluating or had
    /// already reserved them.
    pub in_progress_elsewhere: usize,
}

impl SelectionStats {
    fn count_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Suspect => self.suspect += 1,
            Rejection::Timeout => self.timed_out += 1,
            Rejection::FailedScript => self.failed += 1,
            Rejection::Unclean => self.unclean += 1,
        }
    }
}

/// Nodes reserved by a request, in the order they were accepted.
#[derive(Debug, Default, Serialize)]
pub struct Selection {
    #[serde(serialize_with = "serialize_node_ids")]
    pub nodes: Vec<NodeHandle>,
    pub stats: SelectionStats,
}

impl Selection {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn serialize_node_ids<S: serde::Serializer>(
    nodes: &[NodeHandle],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(nodes.iter().map(|n| n.id()))
}

pub struct AdmissionController {
    cluster: Arc<dyn ClusterCore>,
    knowledge: Arc<KnowledgeBase>,
    authorizer: RwLock<ScriptAuthorizer>,
    /// Bounds the number of evaluators running at once across requests.
    workers: Arc<Semaphore>,
    /// Nodes currently owned by an evaluator or being reserved.
    in_progress: Mutex<HashSet<NodeId>>,
    script_timeout: Duration,
    dispatch: DispatchMode,
    next_request: AtomicU64,
}

/// Candidates claimed by one request. Leaving scope takes them out of the
/// in-progress set, including when the request future is dropped.
struct Claim<'a> {
    in_progress: &'a Mutex<HashSet<NodeId>>,
    nodes: Vec<NodeHandle>,
}

impl Claim<'_> {
    fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut in_progress = lock(self.in_progress);
        for node in &self.nodes {
            in_progress.remove(node.id());
        }
    }
}

/// Nodes marked busy by one request. Unless handed out with
/// [`Reservations::keep`], they are freed again on drop.
struct Reservations<'a> {
    cluster: &'a dyn ClusterCore,
    nodes: Vec<NodeHandle>,
}

impl<'a> Reservations<'a> {
    fn new(cluster: &'a dyn ClusterCore) -> Self {
        Self {
            cluster,
            nodes: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: NodeHandle) {
        self.nodes.push(node);
    }

    fn keep(mut self) -> Vec<NodeHandle> {
        std::mem::take(&mut self.nodes)
    }
}

impl Drop for Reservations<'_> {
    fn drop(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        warn!(count = self.nodes.len(), "rolling back reservations");
        for node in &self.nodes {
            if let Err(e) = self.cluster.free_node(node.id()) {
                error!(node = %node.id(), error = %e, "failed to release node during rollback");
            }
        }
    }
}

/// Aborts pooled evaluator tasks whose batch is no longer awaited.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// The in-progress set holds plain ids, so a poisoned lock is still usable.
fn lock(set: &Mutex<HashSet<NodeId>>) -> MutexGuard<'_, HashSet<NodeId>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AdmissionController {
    pub fn new(cluster: Arc<dyn ClusterCore>, config: &SelectionConfig) -> SelectionResult<Self> {
        let knowledge = Arc::new(KnowledgeBase::new(config.knowledge_capacity));
        Self::with_knowledge(cluster, config, knowledge)
    }

    /// Build a controller that learns into an existing knowledge base.
    pub fn with_knowledge(
        cluster: Arc<dyn ClusterCore>,
        config: &SelectionConfig,
        knowledge: Arc<KnowledgeBase>,
    ) -> SelectionResult<Self> {
        config.validate()?;
        let authorizer = match &config.authorized_scripts_dir {
            Some(dir) => ScriptAuthorizer::from_dir(dir, config.authorized_scripts_refresh()?)?,
            None => ScriptAuthorizer::permissive(),
        };
        Ok(Self {
            cluster,
            knowledge,
            authorizer: RwLock::new(authorizer),
            workers: Arc::new(Semaphore::new(config.max_workers)),
            in_progress: Mutex::new(HashSet::new()),
            script_timeout: config.script_timeout()?,
            dispatch: config.dispatch,
            next_request: AtomicU64::new(1),
        })
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Re-read the authorized scripts directory now, if one is configured.
    pub async fn reload_authorized_scripts(&self) -> SelectionResult<()> {
        self.authorizer.write().await.reload()
    }

    /// Find and reserve up to `count` free nodes satisfying every script.
    ///
    /// Returning fewer than `count` nodes is not an error. An error means a
    /// script raised during evaluation (or the cluster core refused a state
    /// change); no reservation made by this call survives it. The same
    /// holds when the returned future is dropped before completion.
    pub async fn find_nodes(
        &self,
        count: usize,
        scripts: &[SelectionScript],
        exclusions: &HashSet<NodeId>,
    ) -> SelectionResult<Selection> {
        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("find_nodes", request, count, scripts = scripts.len());
        self.select(count, scripts, exclusions).instrument(span).await
    }

    async fn authorize(&self, scripts: &[SelectionScript]) -> SelectionResult<()> {
        if scripts.is_empty() {
            return Ok(());
        }
        if self.authorizer.read().await.is_stale() {
            self.authorizer.write().await.refresh_if_stale();
        }
        self.authorizer.read().await.check(scripts)
    }

    async fn select(
        &self,
        count: usize,
        scripts: &[SelectionScript],
        exclusions: &HashSet<NodeId>,
    ) -> SelectionResult<Selection> {
        self.authorize(scripts).await?;
        for script in scripts {
            debug!(%script, body = script.body(), "selection script");
        }

        let mut stats = SelectionStats {
            requested: count,
            ..SelectionStats::default()
        };
        let free = self.cluster.free_nodes()?;
        stats.free = free.len();
        let candidates = ranking::arrange(free, exclusions, scripts, &self.knowledge).await;
        stats.candidates = candidates.len();

        let nodes = if scripts.is_empty() {
            self.reserve_unscripted(count, candidates, &mut stats).await?
        } else {
            self.reserve_scripted(count, candidates, scripts.into(), &mut stats)
                .await?
        };

        info!(
            requested = count,
            selected = nodes.len(),
            free = stats.free,
            candidates = stats.candidates,
            waves = stats.waves,
            evaluated = stats.evaluated,
            failed = stats.failed,
            suspect = stats.suspect,
            timed_out = stats.timed_out,
            unclean = stats.unclean,
            "selection finished"
        );
        Ok(Selection { nodes, stats })
    }

    /// No scripts: clean and reserve candidates in order.
    async fn reserve_unscripted(
        &self,
        count: usize,
        candidates: Vec<NodeHandle>,
        stats: &mut SelectionStats,
    ) -> SelectionResult<Vec<NodeHandle>> {
        let mut queue: VecDeque<NodeHandle> = candidates.into();
        let mut reserved = Reservations::new(self.cluster.as_ref());

        while reserved.len() < count && !queue.is_empty() {
            let claim = self.claim_batch(&mut queue, 1, stats)?;
            for node in claim.nodes() {
                if self.reserve_cleaned(node, stats).await? {
                    reserved.push(node.clone());
                }
            }
        }
        Ok(reserved.keep())
    }

    /// Clean a node and mark it busy; a node that cannot be cleaned goes down.
    async fn reserve_cleaned(
        &self,
        node: &NodeHandle,
        stats: &mut SelectionStats,
    ) -> SelectionResult<bool> {
        if let Err(e) = node.clean().await {
            warn!(node = %node.id(), error = %e, "node could not be cleaned, marking down");
            stats.unclean += 1;
            self.cluster.set_down(node.id())?;
            return Ok(false);
        }
        self.cluster.set_busy(node.id())?;
        stats.accepted += 1;
        Ok(true)
    }

    async fn reserve_scripted(
        &self,
        count: usize,
        candidates: Vec<NodeHandle>,
        scripts: Arc<[SelectionScript]>,
        stats: &mut SelectionStats,
    ) -> SelectionResult<Vec<NodeHandle>> {
        let mut queue: VecDeque<NodeHandle> = candidates.into();
        let mut reserved = Reservations::new(self.cluster.as_ref());

        while reserved.len() < count && !queue.is_empty() {
            let claim = self.claim_batch(&mut queue, count - reserved.len(), stats)?;
            if claim.is_empty() {
                continue;
            }
            stats.waves += 1;
            debug!(wave = stats.waves, size = claim.nodes().len(), "evaluating wave");

            let evaluations = self.run_batch(claim.nodes(), &scripts).await;
            // Reservations happen before the claim is released.
            self.settle(evaluations, &mut reserved, stats)?;
        }
        Ok(reserved.keep())
    }

    /// Take up to `size` candidates from the front of the queue that are
    /// still free and that no other request is working on, and mark them
    /// in progress.
    fn claim_batch(
        &self,
        queue: &mut VecDeque<NodeHandle>,
        size: usize,
        stats: &mut SelectionStats,
    ) -> SelectionResult<Claim<'_>> {
        let mut in_progress = lock(&self.in_progress);
        let mut claim = Claim {
            in_progress: &self.in_progress,
            nodes: Vec::with_capacity(size),
        };
        while claim.nodes.len() < size {
            let Some(node) = queue.pop_front() else { break };
            if self.claimable(&in_progress, &node)? {
                in_progress.insert(node.id().clone());
                claim.nodes.push(node);
            } else {
                stats.in_progress_elsewhere += 1;
            }
        }
        Ok(claim)
    }

    /// The free-pool snapshot may be stale by the time a node is claimed.
    fn claimable(&self, in_progress: &HashSet<NodeId>, node: &NodeHandle) -> SelectionResult<bool> {
        if in_progress.contains(node.id()) {
            debug!(node = %node.id(), "node is being evaluated by another request");
            return Ok(false);
        }
        if !self.cluster.is_free(node.id())? {
            debug!(node = %node.id(), "node was taken by another request");
            return Ok(false);
        }
        Ok(true)
    }

    async fn run_batch(
        &self,
        batch: &[NodeHandle],
        scripts: &Arc<[SelectionScript]>,
    ) -> Vec<Evaluation> {
        let deadline = Instant::now() + self.script_timeout;
        let evaluator = |node: &NodeHandle| {
            PredicateEvaluator::new(node.clone(), scripts.clone(), self.knowledge.clone(), deadline)
        };

        match self.dispatch {
            DispatchMode::Sequential => {
                let mut evaluations = Vec::with_capacity(batch.len());
                for node in batch {
                    let evaluation = evaluator(node).run().await;
                    let errored = matches!(evaluation.verdict, Verdict::Errored { .. });
                    evaluations.push(evaluation);
                    if errored {
                        break;
                    }
                }
                evaluations
            }
            DispatchMode::Pooled => {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|node| {
                        let evaluator = evaluator(node);
                        let workers = self.workers.clone();
                        let handle = tokio::spawn(async move {
                            // The semaphore is never closed, so acquiring cannot fail.
                            let _permit = workers.acquire_owned().await;
                            evaluator.run().await
                        });
                        (node.clone(), handle)
                    })
                    .collect();
                let _abort = AbortOnDrop(handles.iter().map(|(_, h)| h.abort_handle()).collect());

                let mut evaluations = Vec::with_capacity(handles.len());
                for (node, handle) in handles {
                    let evaluation = match handle.await {
                        Ok(evaluation) => evaluation,
                        Err(e) => Evaluation {
                            node,
                            verdict: Verdict::Errored {
                                script: None,
                                message: format!("evaluator task failed: {e}"),
                            },
                        },
                    };
                    evaluations.push(evaluation);
                }
                evaluations
            }
        }
    }

    /// Apply a wave's verdicts to the cluster core.
    fn settle(
        &self,
        evaluations: Vec<Evaluation>,
        reserved: &mut Reservations<'_>,
        stats: &mut SelectionStats,
    ) -> SelectionResult<()> {
        let mut failure = None;
        let mut accepted = Vec::new();

        for Evaluation { node, verdict } in evaluations {
            stats.evaluated += 1;
            match verdict {
                Verdict::Accepted => accepted.push(node),
                Verdict::Rejected(Rejection::Unclean) => {
                    stats.count_rejection(Rejection::Unclean);
                    warn!(node = %node.id(), "marking unclean node down");
                    self.cluster.set_down(node.id())?;
                }
                Verdict::Rejected(rejection) => stats.count_rejection(rejection),
                Verdict::Errored { script, message } => {
                    let message = match script {
                        Some(script) => format!("script {script}: {message}"),
                        None => message,
                    };
                    error!(node = %node.id(), %message, "selection script execution error");
                    if failure.is_none() {
                        failure = Some(SelectionError::Execution {
                            node: node.id().clone(),
                            message,
                        });
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        for node in accepted {
            self.cluster.set_busy(node.id())?;
            stats.accepted += 1;
            reserved.push(node);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmgrid_core::{NodeState, StateError};
    use rmgrid_state::{NodeRegistry, SimResponse, SimulatedNode};

    fn config(dispatch: DispatchMode) -> SelectionConfig {
        SelectionConfig {
            script_timeout: "5s".to_string(),
            max_workers: 8,
            dispatch,
            ..SelectionConfig::default()
        }
    }

    fn setup(nodes: Vec<SimulatedNode>) -> (NodeRegistry, Vec<Arc<SimulatedNode>>) {
        let registry = NodeRegistry::new();
        let nodes: Vec<_> = nodes.into_iter().map(Arc::new).collect();
        for node in &nodes {
            registry.add_node(node.clone()).unwrap();
        }
        (registry, nodes)
    }

    fn controller(registry: &NodeRegistry, dispatch: DispatchMode) -> AdmissionController {
        AdmissionController::new(Arc::new(registry.clone()), &config(dispatch)).unwrap()
    }

    #[tokio::test]
    async fn stats_track_each_rejection_kind() {
        let (registry, _) = setup(vec![
            SimulatedNode::new("ok"),
            SimulatedNode::new("fails").with_default(SimResponse::Fail),
            SimulatedNode::new("dead").with_unreachable(),
            SimulatedNode::new("dirty").with_failing_clean(),
        ]);
        let ctl = controller(&registry, DispatchMode::Pooled);

        let selection = ctl
            .find_nodes(4, &[SelectionScript::fixed("a")], &HashSet::new())
            .await
            .unwrap();

        assert_eq!(selection.node_ids(), vec!["ok"]);
        let stats = &selection.stats;
        assert_eq!(stats.waves, 1);
        assert_eq!(stats.evaluated, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.suspect, 1);
        assert_eq!(stats.unclean, 1);
        assert_eq!(
            registry.state_of(&"dirty".to_string()).unwrap(),
            Some(NodeState::Down)
        );
        assert_eq!(
            registry.state_of(&"dead".to_string()).unwrap(),
            Some(NodeState::Free)
        );
    }

    #[tokio::test]
    async fn later_waves_fill_the_gap() {
        let (registry, _) = setup(vec![
            SimulatedNode::new("n1").with_default(SimResponse::Fail),
            SimulatedNode::new("n2").with_default(SimResponse::Fail),
            SimulatedNode::new("n3"),
            SimulatedNode::new("n4"),
        ]);
        let ctl = controller(&registry, DispatchMode::Pooled);

        let selection = ctl
            .find_nodes(2, &[SelectionScript::dynamic("a")], &HashSet::new())
            .await
            .unwrap();

        assert_eq!(selection.node_ids(), vec!["n3", "n4"]);
        assert_eq!(selection.stats.waves, 2);
        assert_eq!(registry.count(NodeState::Busy).unwrap(), 2);
    }

    #[tokio::test]
    async fn sequential_dispatch_stops_wave_at_first_error() {
        let (registry, nodes) = setup(vec![
            SimulatedNode::new("n1").with_default(SimResponse::Error("bad".into())),
            SimulatedNode::new("n2"),
        ]);
        let ctl = controller(&registry, DispatchMode::Sequential);

        let err = ctl
            .find_nodes(2, &[SelectionScript::fixed("a")], &HashSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SelectionError::Execution { ref node, .. } if node == "n1"));
        assert_eq!(nodes[1].evaluations(), 0);
        assert_eq!(registry.count(NodeState::Free).unwrap(), 2);
    }

    #[tokio::test]
    async fn unauthorized_scripts_are_refused_before_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.js"), "selected = true").unwrap();
        let (registry, nodes) = setup(vec![SimulatedNode::new("n1")]);
        let mut cfg = config(DispatchMode::Pooled);
        cfg.authorized_scripts_dir = Some(dir.path().to_path_buf());
        let ctl = AdmissionController::new(Arc::new(registry.clone()), &cfg).unwrap();

        let err = ctl
            .find_nodes(1, &[SelectionScript::fixed("selected = false")], &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::Unauthorized { .. }));
        assert_eq!(nodes[0].evaluations(), 0);

        let ok = ctl
            .find_nodes(1, &[SelectionScript::fixed("selected = true")], &HashSet::new())
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);

        std::fs::write(dir.path().join("more.js"), "selected = false").unwrap();
        ctl.reload_authorized_scripts().await.unwrap();
        registry.free_node(&"n1".to_string()).unwrap();
        let now_ok = ctl
            .find_nodes(1, &[SelectionScript::fixed("selected = false")], &HashSet::new())
            .await
            .unwrap();
        assert_eq!(now_ok.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn authorized_scripts_are_picked_up_after_the_refresh_period() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.js"), "selected = true").unwrap();
        let (registry, _) = setup(vec![SimulatedNode::new("n1")]);
        let mut cfg = config(DispatchMode::Pooled);
        cfg.authorized_scripts_dir = Some(dir.path().to_path_buf());
        cfg.authorized_scripts_refresh = "10s".to_string();
        let ctl = AdmissionController::new(Arc::new(registry.clone()), &cfg).unwrap();
        let late = [SelectionScript::fixed("arch == 'x86'")];

        std::fs::write(dir.path().join("late.js"), "arch == 'x86'").unwrap();
        let err = ctl.find_nodes(1, &late, &HashSet::new()).await.unwrap_err();
        assert!(matches!(err, SelectionError::Unauthorized { .. }));

        tokio::time::advance(Duration::from_secs(11)).await;
        let selection = ctl.find_nodes(1, &late, &HashSet::new()).await.unwrap();
        assert_eq!(selection.node_ids(), vec!["n1"]);
    }

    #[tokio::test]
    async fn nodes_in_progress_elsewhere_are_skipped() {
        let (registry, nodes) = setup(vec![SimulatedNode::new("n1"), SimulatedNode::new("n2")]);
        let ctl = controller(&registry, DispatchMode::Pooled);
        lock(&ctl.in_progress).insert("n1".to_string());

        let selection = ctl
            .find_nodes(2, &[SelectionScript::fixed("a")], &HashSet::new())
            .await
            .unwrap();

        assert_eq!(selection.node_ids(), vec!["n2"]);
        assert_eq!(selection.stats.in_progress_elsewhere, 1);
        assert_eq!(nodes[0].evaluations(), 0);
        assert_eq!(*lock(&ctl.in_progress), HashSet::from(["n1".to_string()]));
    }

    #[tokio::test]
    async fn unscripted_request_marks_unclean_nodes_down() {
        let (registry, _) = setup(vec![
            SimulatedNode::new("n1").with_failing_clean(),
            SimulatedNode::new("n2"),
        ]);
        let ctl = controller(&registry, DispatchMode::Pooled);

        let selection = ctl.find_nodes(1, &[], &HashSet::new()).await.unwrap();

        assert_eq!(selection.node_ids(), vec!["n2"]);
        assert_eq!(selection.stats.unclean, 1);
        assert_eq!(
            registry.state_of(&"n1".to_string()).unwrap(),
            Some(NodeState::Down)
        );
    }

    /// Cluster core that refuses to reserve one specific node.
    struct RefusingCore {
        inner: NodeRegistry,
        refuse: NodeId,
    }

    impl ClusterCore for RefusingCore {
        fn free_nodes(&self) -> rmgrid_core::StateResult<Vec<NodeHandle>> {
            self.inner.free_nodes()
        }
        fn set_busy(&self, node: &NodeId) -> rmgrid_core::StateResult<()> {
            if *node == self.refuse {
                return Err(StateError::UnknownNode(node.clone()));
            }
            self.inner.set_busy(node)
        }
        fn set_down(&self, node: &NodeId) -> rmgrid_core::StateResult<()> {
            self.inner.set_down(node)
        }
        fn free_node(&self, node: &NodeId) -> rmgrid_core::StateResult<()> {
            self.inner.free_node(node)
        }
    }

    #[tokio::test]
    async fn refused_reservation_rolls_back_earlier_ones() {
        let (registry, _) = setup(vec![SimulatedNode::new("n1"), SimulatedNode::new("n2")]);
        let core = RefusingCore {
            inner: registry.clone(),
            refuse: "n2".to_string(),
        };
        let ctl = AdmissionController::new(Arc::new(core), &config(DispatchMode::Pooled)).unwrap();

        let err = ctl
            .find_nodes(2, &[SelectionScript::fixed("a")], &HashSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SelectionError::State(_)));
        assert_eq!(registry.count(NodeState::Busy).unwrap(), 0);
        assert_eq!(registry.count(NodeState::Free).unwrap(), 2);
    }
}
