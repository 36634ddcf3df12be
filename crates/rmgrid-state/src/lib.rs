//! rmgrid-state — the in-memory cluster core.
//!
//! [`NodeRegistry`] implements [`rmgrid_core::ClusterCore`]: it owns the
//! free/busy/down lifecycle of every registered node and hands out
//! snapshots of the free pool in registration order.
//!
//! [`SimulatedNode`] is a [`rmgrid_core::Node`] whose script verdicts,
//! latency, and failure modes come from a declarative table. It backs the
//! `rmgridd` simulator and the admission-control tests.
//!
//! The registry is `Clone` + `Send` + `Sync` (backed by `Arc<RwLock<_>>`)
//! and can be shared across async tasks.

pub mod registry;
pub mod simulated;

pub use registry::NodeRegistry;
pub use simulated::{SimResponse, SimulatedNode};
