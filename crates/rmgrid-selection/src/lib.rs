//! rmgrid-selection — admission control for the rmgrid resource manager.
//!
//! Given the free pool and a request's selection scripts, picks and
//! reserves the best `n` nodes whose environment satisfies every script,
//! while learning which nodes tend to satisfy which scripts so that known
//! outcomes are not re-evaluated remotely.
//!
//! # Architecture
//!
//! ```text
//! AdmissionController::find_nodes(count, scripts, exclusions)
//!   ├── ScriptAuthorizer (optional allow-list of script digests)
//!   ├── ClusterCore::free_nodes()
//!   ├── ranking::arrange() ──▶ KnowledgeBase::combined_confidence()
//!   ├── waves of PredicateEvaluator, pooled or sequential
//!   │     └── KnowledgeBase::record() per conclusive outcome
//!   └── ClusterCore::set_busy / set_down / free_node (rollback)
//! ```
//!
//! # Learning
//!
//! Each (script, node) pair carries a [`Probability`]. Dynamic scripts
//! move it along an arctangent curve that never reaches 0 or 1; static
//! scripts pin it to exactly 0 or 1 after their first conclusive run,
//! which lets the evaluator skip known passes and the ranking drop known
//! failures.

pub mod authorization;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod knowledge;
pub mod probability;
pub mod ranking;

pub use authorization::ScriptAuthorizer;
pub use controller::{AdmissionController, Selection, SelectionStats};
pub use error::{SelectionError, SelectionResult};
pub use evaluator::{Evaluation, PredicateEvaluator, Rejection, Verdict};
pub use knowledge::KnowledgeBase;
pub use probability::Probability;
pub use ranking::{RankedNode, arrange, rank};
