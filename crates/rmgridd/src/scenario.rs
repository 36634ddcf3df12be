//! Scenario files: a selection config, a simulated cluster, and the
//! requests to run against it.
//!
//! ```toml
//! [selection]
//! script_timeout = "2s"
//!
//! [[nodes]]
//! id = "node-1"
//! latency = "20ms"
//! responses = [{ script = "has_gpu", response = "fail" }]
//!
//! [[requests]]
//! count = 2
//! scripts = [{ body = "has_gpu", dynamic = false }]
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Deserialize;

use rmgrid_core::{NodeId, SelectionConfig, SelectionScript, parse_duration};
use rmgrid_state::{NodeRegistry, SimResponse, SimulatedNode};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default = "default_response")]
    pub default: SimResponse,
    #[serde(default)]
    pub responses: Vec<ResponseSpec>,
    /// Delay before every script verdict ("50ms", "1s").
    #[serde(default)]
    pub latency: Option<String>,
    #[serde(default)]
    pub clean_fails: bool,
    #[serde(default)]
    pub unreachable: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResponseSpec {
    /// Script body this response applies to.
    pub script: String,
    pub response: SimResponse,
}

#[derive(Debug, Deserialize)]
pub struct RequestSpec {
    pub count: usize,
    #[serde(default)]
    pub scripts: Vec<SelectionScript>,
    #[serde(default)]
    pub exclude: Vec<NodeId>,
    /// Run the request this many times in a row.
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    /// Return reserved nodes to the free pool after each run.
    #[serde(default)]
    pub release: bool,
}

fn default_response() -> SimResponse {
    SimResponse::Pass
}

fn default_repeat() -> usize {
    1
}

impl RequestSpec {
    pub fn exclusions(&self) -> HashSet<NodeId> {
        self.exclude.iter().cloned().collect()
    }
}

impl NodeSpec {
    fn build(&self) -> anyhow::Result<SimulatedNode> {
        let mut node = SimulatedNode::new(self.id.clone()).with_default(self.default.clone());
        for entry in &self.responses {
            node = node.with_response(&entry.script, entry.response.clone());
        }
        if let Some(latency) = &self.latency {
            let latency = parse_duration("nodes.latency", latency)
                .with_context(|| format!("node {}", self.id))?;
            node = node.with_latency(latency);
        }
        if self.clean_fails {
            node = node.with_failing_clean();
        }
        if self.unreachable {
            node = node.with_unreachable();
        }
        Ok(node)
    }
}

impl Scenario {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in scenario {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.selection.validate()?;
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                bail!("node {} is listed twice", node.id);
            }
        }
        for (i, request) in self.requests.iter().enumerate() {
            if request.repeat == 0 {
                bail!("request {i}: repeat must be at least 1");
            }
        }
        Ok(())
    }

    /// Register every simulated node as free.
    pub fn build_registry(&self) -> anyhow::Result<NodeRegistry> {
        let registry = NodeRegistry::new();
        for spec in &self.nodes {
            registry.add_node(Arc::new(spec.build()?))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmgrid_core::{DispatchMode, NodeState};

    const SAMPLE: &str = r#"
[selection]
script_timeout = "2s"
dispatch = "sequential"

[[nodes]]
id = "a"
latency = "10ms"
responses = [
    { script = "has_gpu", response = "fail" },
    { script = "broken", response = { error = "syntax error" } },
]

[[nodes]]
id = "b"
default = "hang"
clean_fails = true

[[requests]]
count = 1
scripts = [{ body = "has_gpu", dynamic = false }, { body = "load < 1" }]
exclude = ["b"]
repeat = 2
release = true

[[requests]]
count = 3
"#;

    #[test]
    fn parses_full_scenario() {
        let scenario = Scenario::parse(SAMPLE).unwrap();

        assert_eq!(scenario.selection.dispatch, DispatchMode::Sequential);
        assert_eq!(scenario.nodes.len(), 2);
        assert_eq!(scenario.nodes[0].default, SimResponse::Pass);
        assert_eq!(
            scenario.nodes[0].responses[1].response,
            SimResponse::Error("syntax error".into())
        );
        assert_eq!(scenario.nodes[1].default, SimResponse::Hang);

        let first = &scenario.requests[0];
        assert!(!first.scripts[0].is_dynamic());
        assert!(first.scripts[1].is_dynamic());
        assert_eq!(first.exclusions(), HashSet::from(["b".to_string()]));
        assert_eq!(first.repeat, 2);
        assert!(first.release);

        let second = &scenario.requests[1];
        assert!(second.scripts.is_empty());
        assert_eq!(second.repeat, 1);
        assert!(!second.release);
    }

    #[test]
    fn builds_registry_with_free_nodes() {
        let scenario = Scenario::parse(SAMPLE).unwrap();
        let registry = scenario.build_registry().unwrap();
        assert_eq!(registry.count(NodeState::Free).unwrap(), 2);
    }

    #[test]
    fn rejects_duplicate_nodes() {
        let err = Scenario::parse("[[nodes]]\nid = \"a\"\n[[nodes]]\nid = \"a\"\n").unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn rejects_bad_latency() {
        let scenario = Scenario::parse("[[nodes]]\nid = \"a\"\nlatency = \"soon\"\n").unwrap();
        assert!(scenario.build_registry().is_err());
    }

    #[test]
    fn rejects_invalid_selection_config() {
        assert!(Scenario::parse("[selection]\nmax_workers = 0\n").is_err());
        assert!(Scenario::parse("[selection]\nscript_timeout = \"later\"\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let scenario = Scenario::from_file(&path).unwrap();
        assert_eq!(scenario.requests.len(), 2);
        assert!(Scenario::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
