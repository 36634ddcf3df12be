//! rmgridd — runs admission requests against a simulated cluster.
//!
//! Loads a scenario file describing simulated nodes and requests, builds
//! an in-memory node registry, and drives every request through the
//! admission controller. Each result is printed as one JSON line.
//!
//! # Usage
//!
//! ```text
//! rmgridd run demos/cluster.toml
//! rmgridd run demos/cluster.toml --config rmgrid.toml --log-format json
//! rmgridd check demos/cluster.toml
//! ```

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};

use rmgrid_core::{ClusterCore, NodeState, RmConfig};
use rmgrid_selection::AdmissionController;

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "rmgridd", about = "rmgrid admission control simulator")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run every request in a scenario and print the results.
    Run {
        /// Scenario file (TOML).
        scenario: PathBuf,

        /// rmgrid.toml whose [selection] section overrides the scenario's.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a scenario without running it.
    Check {
        /// Scenario file (TOML).
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmgridd=debug,rmgrid=debug"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match cli.command {
        Command::Run { scenario, config } => run(scenario, config).await,
        Command::Check { scenario } => check(scenario),
    }
}

fn check(path: PathBuf) -> anyhow::Result<()> {
    let scenario = Scenario::from_file(&path)?;
    scenario.build_registry()?;
    let summary = json!({
        "scenario": path.display().to_string(),
        "nodes": scenario.nodes.len(),
        "requests": scenario.requests.len(),
        "selection": scenario.selection,
    });
    println!("{summary}");
    Ok(())
}

async fn run(path: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let mut scenario = Scenario::from_file(&path)?;
    if let Some(config) = config {
        scenario.selection = RmConfig::from_file(&config)?.selection;
        info!(path = %config.display(), "selection config overridden");
    }

    let registry = scenario.build_registry()?;
    let cluster: Arc<dyn ClusterCore> = Arc::new(registry.clone());
    let controller = AdmissionController::new(cluster.clone(), &scenario.selection)?;
    info!(
        scenario = %path.display(),
        nodes = scenario.nodes.len(),
        requests = scenario.requests.len(),
        dispatch = ?scenario.selection.dispatch,
        "scenario loaded"
    );

    for (index, request) in scenario.requests.iter().enumerate() {
        let exclusions = request.exclusions();
        for round in 0..request.repeat {
            let report = match controller
                .find_nodes(request.count, &request.scripts, &exclusions)
                .await
            {
                Ok(selection) => {
                    if request.release {
                        for node in &selection.nodes {
                            cluster.free_node(node.id())?;
                        }
                    }
                    json!({ "request": index, "round": round, "selection": selection })
                }
                Err(e) => {
                    warn!(request = index, round, error = %e, "request failed");
                    json!({ "request": index, "round": round, "error": e.to_string() })
                }
            };
            println!("{report}");
        }
    }

    let knowledge = controller.knowledge();
    let summary = json!({
        "free": registry.count(NodeState::Free)?,
        "busy": registry.count(NodeState::Busy)?,
        "down": registry.count(NodeState::Down)?,
        "scripts_known": knowledge.script_count().await,
        "knowledge_evictions": knowledge.evictions(),
    });
    println!("{summary}");
    Ok(())
}
