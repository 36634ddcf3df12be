//! Predicate evaluator — runs a request's selection scripts against one
//! candidate node.
//!
//! ```text
//! start ─▶ for each script:
//!            known pass ───────────────▶ next script
//!            dispatch refused ─────────▶ Rejected(Suspect)   + ping
//!            deadline passed ──────────▶ Rejected(Timeout)
//!            Error(..) ────────────────▶ Errored
//!            Fail ─────────── record ──▶ Rejected(FailedScript)
//!            Pass ─────────── record ──▶ next script
//!        all passed ─▶ clean ok ───────▶ Accepted
//!                      clean failed ───▶ Rejected(Unclean)
//! ```
//!
//! Scripts run strictly in order and the first failure short-circuits the
//! rest. Every remote wait is bounded by a deadline shared by the whole
//! batch, so a slow node cannot stretch the batch past it.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use rmgrid_core::{NodeHandle, ScriptDigest, ScriptOutcome, SelectionScript};

use crate::knowledge::KnowledgeBase;

/// Why a node was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Evaluation could not be dispatched; the node may be dead.
    Suspect,
    /// No verdict before the batch deadline.
    Timeout,
    /// A script returned false.
    FailedScript,
    /// All scripts passed but the node could not be cleaned.
    Unclean,
}

/// Terminal state of one evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
    /// A script raised a genuine execution error, or the evaluator itself
    /// died (`script` is then unknown).
    Errored {
        script: Option<ScriptDigest>,
        message: String,
    },
}

/// Result of evaluating one node.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub node: NodeHandle,
    pub verdict: Verdict,
}

/// Evaluation unit for a single candidate node.
pub struct PredicateEvaluator {
    node: NodeHandle,
    scripts: Arc<[SelectionScript]>,
    knowledge: Arc<KnowledgeBase>,
    deadline: Instant,
}

impl PredicateEvaluator {
    pub fn new(
        node: NodeHandle,
        scripts: Arc<[SelectionScript]>,
        knowledge: Arc<KnowledgeBase>,
        deadline: Instant,
    ) -> Self {
        Self {
            node,
            scripts,
            knowledge,
            deadline,
        }
    }

    pub async fn run(self) -> Evaluation {
        let verdict = self.evaluate().await;
        debug!(node = %self.node.id(), ?verdict, "node evaluated");
        Evaluation {
            node: self.node,
            verdict,
        }
    }

    async fn evaluate(&self) -> Verdict {
        let id = self.node.id();

        for script in self.scripts.iter() {
            if self.knowledge.is_known_pass(script, id).await {
                debug!(node = %id, %script, "script known to pass, skipping");
                continue;
            }

            let pending = match self.node.evaluate(script) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(node = %id, %script, error = %e, "cannot dispatch script, probing node");
                    let node = self.node.clone();
                    tokio::spawn(async move { node.ping().await });
                    return Verdict::Rejected(Rejection::Suspect);
                }
            };

            let outcome = timeout_at(self.deadline, pending)
                .await
                .unwrap_or(ScriptOutcome::Timeout);

            match outcome {
                ScriptOutcome::Pass => {
                    self.knowledge.record(script, id, &outcome).await;
                }
                ScriptOutcome::Fail => {
                    self.knowledge.record(script, id, &outcome).await;
                    debug!(node = %id, %script, "script failed");
                    return Verdict::Rejected(Rejection::FailedScript);
                }
                ScriptOutcome::Timeout => {
                    debug!(node = %id, %script, "script timed out");
                    return Verdict::Rejected(Rejection::Timeout);
                }
                ScriptOutcome::Error(message) => {
                    return Verdict::Errored {
                        script: Some(script.digest().clone()),
                        message,
                    };
                }
            }
        }

        match self.node.clean().await {
            Ok(()) => Verdict::Accepted,
            Err(e) => {
                warn!(node = %id, error = %e, "node passed scripts but could not be cleaned");
                Verdict::Rejected(Rejection::Unclean)
            }
        }
    }
}
