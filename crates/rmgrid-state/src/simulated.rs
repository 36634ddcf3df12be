//! Simulated nodes with scripted behaviour.
//!
//! A [`SimulatedNode`] answers each selection script according to a table
//! keyed by the script's content digest, falling back to a default
//! response. It counts every dispatch, clean, and ping so callers can
//! assert on how the node was used.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rmgrid_core::{
    BoxFuture, EvaluationFuture, Node, NodeError, NodeId, ScriptOutcome, SelectionScript,
    content_digest,
};

/// How a simulated node answers a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimResponse {
    Pass,
    Fail,
    /// The script raises instead of producing a verdict.
    Error(String),
    /// The script never completes.
    Hang,
}

impl SimResponse {
    async fn play(self, latency: Duration) -> ScriptOutcome {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self {
            SimResponse::Pass => ScriptOutcome::Pass,
            SimResponse::Fail => ScriptOutcome::Fail,
            SimResponse::Error(message) => ScriptOutcome::Error(message),
            SimResponse::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedNode {
    id: NodeId,
    /// Content digest → response.
    responses: HashMap<String, SimResponse>,
    default_response: SimResponse,
    latency: Duration,
    clean_fails: bool,
    unreachable: bool,
    evaluations: AtomicUsize,
    cleans: AtomicUsize,
    pings: AtomicUsize,
}

impl SimulatedNode {
    /// A node that passes every script.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            responses: HashMap::new(),
            default_response: SimResponse::Pass,
            latency: Duration::ZERO,
            clean_fails: false,
            unreachable: false,
            evaluations: AtomicUsize::new(0),
            cleans: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
        }
    }

    /// Answer scripts with this body with `response`.
    pub fn with_response(mut self, body: &str, response: SimResponse) -> Self {
        self.responses.insert(content_digest(body), response);
        self
    }

    /// Answer scripts without a specific entry with `response`.
    pub fn with_default(mut self, response: SimResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failing_clean(mut self) -> Self {
        self.clean_fails = true;
        self
    }

    pub fn with_unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Number of scripts dispatched to this node.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cleans(&self) -> usize {
        self.cleans.load(Ordering::Relaxed)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::Relaxed)
    }

    fn response_for(&self, script: &SelectionScript) -> SimResponse {
        self.responses
            .get(&script.content_digest())
            .cloned()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Node for SimulatedNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn evaluate(&self, script: &SelectionScript) -> Result<EvaluationFuture, NodeError> {
        if self.unreachable {
            return Err(NodeError::Unreachable(self.id.clone()));
        }
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let response = self.response_for(script);
        debug!(node = %self.id, %script, ?response, "simulated evaluation dispatched");
        Ok(Box::pin(response.play(self.latency)))
    }

    fn clean(&self) -> BoxFuture<'_, Result<(), NodeError>> {
        Box::pin(async move {
            self.cleans.fetch_add(1, Ordering::Relaxed);
            if self.clean_fails {
                Err(NodeError::Clean(format!("{} left dirty", self.id)))
            } else {
                Ok(())
            }
        })
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pings.fetch_add(1, Ordering::Relaxed);
        })
    }
}
