//! KnowledgeBase — what the manager has learned about which nodes satisfy
//! which selection scripts.
//!
//! # Concurrency model
//!
//! Knowledge is sharded by script digest. The shard map sits behind a
//! `tokio::sync::RwLock` that is only held long enough to clone a shard
//! handle; each shard guards its node → [`Probability`] map with its own
//! `Mutex`. Evaluators working on different nodes for the same script
//! contend on that shard only, and evaluators for different scripts never
//! contend at all. No two evaluators touch the same (script, node) key at
//! once because each node is owned by a single evaluator.
//!
//! # Eviction
//!
//! The number of distinct scripts is bounded by `capacity`. When a new
//! script would exceed it, the least recently used shard is dropped and
//! its knowledge reverts to the neutral default. An update racing with the
//! eviction of its own shard re-creates the shard rather than writing into
//! the detached one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use rmgrid_core::{NodeId, ScriptDigest, ScriptOutcome, SelectionScript};

use crate::probability::Probability;

struct Shard {
    nodes: Mutex<HashMap<NodeId, Probability>>,
    /// Last access for LRU tracking (nanos since the knowledge base epoch).
    last_accessed_nanos: AtomicU64,
}

impl Shard {
    fn new(epoch: Instant) -> Self {
        let shard = Self {
            nodes: Mutex::new(HashMap::new()),
            last_accessed_nanos: AtomicU64::new(0),
        };
        shard.touch(epoch);
        shard
    }

    fn touch(&self, epoch: Instant) {
        let nanos = Instant::now().duration_since(epoch).as_nanos() as u64;
        self.last_accessed_nanos.store(nanos, Ordering::Relaxed);
    }
}

pub struct KnowledgeBase {
    shards: RwLock<HashMap<ScriptDigest, Arc<Shard>>>,
    /// Maximum number of scripts tracked; 0 means unbounded.
    capacity: usize,
    epoch: Instant,
    evictions: AtomicU64,
}

impl KnowledgeBase {
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            capacity,
            epoch: Instant::now(),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    async fn shard(&self, digest: &ScriptDigest) -> Option<Arc<Shard>> {
        let shard = self.shards.read().await.get(digest).cloned()?;
        shard.touch(self.epoch);
        Some(shard)
    }

    async fn shard_or_insert(&self, digest: &ScriptDigest) -> Arc<Shard> {
        if let Some(shard) = self.shard(digest).await {
            return shard;
        }
        let mut shards = self.shards.write().await;
        self.shard_or_insert_locked(&mut shards, digest)
    }

    fn shard_or_insert_locked(
        &self,
        shards: &mut HashMap<ScriptDigest, Arc<Shard>>,
        digest: &ScriptDigest,
    ) -> Arc<Shard> {
        // Another evaluator may have created it while we waited.
        if let Some(shard) = shards.get(digest) {
            shard.touch(self.epoch);
            return shard.clone();
        }
        if self.capacity > 0 && shards.len() >= self.capacity {
            let victim = shards
                .iter()
                .min_by_key(|(_, s)| s.last_accessed_nanos.load(Ordering::Relaxed))
                .map(|(d, _)| d.clone());
            if let Some(victim) = victim {
                shards.remove(&victim);
                let evictions = self.evictions.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    script = %victim,
                    capacity = self.capacity,
                    evictions,
                    "knowledge evicted for least recently used script"
                );
            }
        }
        let shard = Arc::new(Shard::new(self.epoch));
        shards.insert(digest.clone(), shard.clone());
        shard
    }

    /// Stored probability for a (script, node) pair, if any.
    pub async fn probability(&self, script: &SelectionScript, node: &NodeId) -> Option<Probability> {
        let shard = self.shard(script.digest()).await?;
        let nodes = shard.nodes.lock().await;
        nodes.get(node).copied()
    }

    /// Combined confidence that `node` satisfies every script.
    ///
    /// Returns `None` when any script is known to fail on the node; the node
    /// is then ineligible rather than merely unlikely. Otherwise returns the
    /// product of the individual probabilities, unknown pairs counting as
    /// the neutral default.
    pub async fn combined_confidence(
        &self,
        node: &NodeId,
        scripts: &[SelectionScript],
    ) -> Option<f64> {
        let mut combined = 1.0;
        for script in scripts {
            let value = match self.probability(script, node).await {
                Some(p) if p.is_certain_fail() => return None,
                Some(p) => p.value(),
                None => Probability::default_value(),
            };
            combined *= value;
        }
        Some(combined)
    }

    /// Whether `script` is known for certain to pass on `node`.
    pub async fn is_known_pass(&self, script: &SelectionScript, node: &NodeId) -> bool {
        self.probability(script, node)
            .await
            .is_some_and(|p| p.is_certain_pass())
    }

    /// Fold an evaluation outcome into the learned model.
    ///
    /// Errors and timeouts are inconclusive and leave knowledge untouched.
    pub async fn record(&self, script: &SelectionScript, node: &NodeId, outcome: &ScriptOutcome) {
        if !outcome.is_conclusive() {
            return;
        }
        let passed = matches!(outcome, ScriptOutcome::Pass);
        let shard = self.shard_or_insert(script.digest()).await;
        self.update(shard, script, node, passed).await;
    }

    /// Apply an outcome through a shard handle that may have been evicted
    /// since it was looked up.
    async fn update(
        &self,
        shard: Arc<Shard>,
        script: &SelectionScript,
        node: &NodeId,
        passed: bool,
    ) {
        let digest = script.digest();
        {
            // Eviction needs the write lock, so the shard stays mapped while this is held.
            let shards = self.shards.read().await;
            if shards.get(digest).is_some_and(|mapped| Arc::ptr_eq(mapped, &shard)) {
                apply(&shard, script, node, passed).await;
                return;
            }
        }
        debug!(%script, "shard evicted before update, reinserting");
        let mut shards = self.shards.write().await;
        let shard = self.shard_or_insert_locked(&mut shards, digest);
        apply(&shard, script, node, passed).await;
    }

    /// Number of distinct scripts currently tracked.
    pub async fn script_count(&self) -> usize {
        self.shards.read().await.len()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

async fn apply(shard: &Shard, script: &SelectionScript, node: &NodeId, passed: bool) {
    let mut nodes = shard.nodes.lock().await;
    let probability = nodes.entry(node.clone()).or_default();
    match (script.is_dynamic(), passed) {
        (true, true) => probability.increase(),
        (true, false) => probability.decrease(),
        (false, passed) => probability.set_certain(passed),
    }
    debug!(
        %node,
        %script,
        passed,
        confidence = probability.value(),
        "knowledge updated"
    );
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::unbounded()
    }
}
