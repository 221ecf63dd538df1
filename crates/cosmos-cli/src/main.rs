use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cosmos_core::{CosmosConfig, ExecutionMode, TestBehavior};
use cosmos_dbt::{select_nodes, Manifest, NodeCollection};
use cosmos_airflow::{build_airflow_graph, calculate_leaves, TaskGraph};

/// Cosmos - render dbt projects as Airflow task graphs
#[derive(Parser)]
#[command(name = "cosmos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: cosmos.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the task graph as JSON
    Render {
        /// Path to dbt manifest.json (default: <dbt_project>/target/manifest.json)
        #[arg(short = 'f', long)]
        manifest: Option<PathBuf>,

        /// Output file, or '-' for stdout
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,

        /// Test placement: none, after_each, after_all
        #[arg(long)]
        test_behavior: Option<TestBehavior>,

        /// Execution mode: local, docker, kubernetes, virtualenv
        #[arg(long)]
        execution_mode: Option<ExecutionMode>,
    },

    /// List nodes nothing else depends on
    Leaves {
        /// Path to dbt manifest.json (default: <dbt_project>/target/manifest.json)
        #[arg(short = 'f', long)]
        manifest: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        CosmosConfig::from_file(config_path)?
    } else if Path::new("cosmos.toml").exists() {
        CosmosConfig::from_file(Path::new("cosmos.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        CosmosConfig::default()
    };

    match cli.command {
        Commands::Render { manifest, output, test_behavior, execution_mode } => {
            let mut config = config;
            if let Some(test_behavior) = test_behavior {
                config.render.test_behavior = test_behavior;
            }
            if let Some(execution_mode) = execution_mode {
                config.execution.execution_mode = execution_mode;
            }
            render_command(&config, manifest.as_deref(), &output, cli.verbose)
        }
        Commands::Leaves { manifest } => leaves_command(&config, manifest.as_deref(), cli.verbose),
    }
}

/// Load the manifest and apply the configured selection
fn load_nodes(config: &CosmosConfig, manifest: Option<&Path>, verbose: bool) -> Result<NodeCollection> {
    let manifest_path = manifest
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.project.manifest_path());

    if !manifest_path.exists() {
        return Err(anyhow::anyhow!(
            "Manifest not found at {}. Run 'dbt compile' or 'dbt build' first.",
            manifest_path.display()
        ));
    }

    if verbose {
        eprintln!("{} {}", "Loading manifest from:".cyan(), manifest_path.display());
    }

    let manifest = Manifest::from_file(&manifest_path)
        .map_err(|e| anyhow::anyhow!("Failed to load manifest: {}", e))?;
    let nodes = manifest.to_nodes()?;

    let selected = select_nodes(&nodes, &config.render.select, &config.render.exclude)?;

    if verbose {
        eprintln!(
            "{} {} of {} nodes",
            "Selected".cyan(),
            selected.len(),
            nodes.len()
        );
    }

    Ok(selected)
}

/// Render command - build the task graph and write it as JSON
fn render_command(config: &CosmosConfig, manifest: Option<&Path>, output: &Path, verbose: bool) -> Result<()> {
    let nodes = load_nodes(config, manifest, verbose)?;

    if verbose {
        eprintln!(
            "{} test behavior: {}, execution mode: {}",
            "Building task graph...".cyan(),
            config.render.test_behavior,
            config.execution.execution_mode
        );
    }

    let graph = build_airflow_graph(&nodes, config, &config.task_args())?;
    let json = serde_json::to_string_pretty(&graph)?;

    if output == Path::new("-") {
        println!("{}", json);
    } else {
        std::fs::write(output, json)?;
        eprintln!("{} {}", "Task graph saved to:".green(), output.display());
    }

    print_graph_summary(&graph);

    Ok(())
}

/// Leaves command - print nodes nothing depends on
fn leaves_command(config: &CosmosConfig, manifest: Option<&Path>, verbose: bool) -> Result<()> {
    let nodes = load_nodes(config, manifest, verbose)?;
    let leaves = task_leaves(&nodes);

    if leaves.is_empty() {
        println!("{}", "No nodes selected".yellow());
    }

    for leaf in leaves {
        let kind = nodes
            .get(&leaf)
            .map(|node| node.resource_type.to_string())
            .unwrap_or_default();
        println!("{} ({})", leaf.green(), kind);
    }

    Ok(())
}

/// Leaves among the nodes that become tasks; tests never hide the node they test
fn task_leaves(nodes: &NodeCollection) -> Vec<String> {
    let task_ids = nodes
        .iter()
        .filter(|node| !node.is_test())
        .map(|node| node.unique_id.as_str());
    calculate_leaves(task_ids, nodes)
}

fn print_graph_summary(graph: &TaskGraph) {
    eprintln!();
    eprintln!("{}", "Task Graph Summary".bold().bright_blue());
    eprintln!("  {} {}", "Tasks:".bold(), graph.tasks().len());
    eprintln!("  {} {}", "Groups:".bold(), graph.groups().len());
    eprintln!("  {} {}", "Edges:".bold(), graph.edges().len());
    eprintln!("  {} {}", "Ends with:".bold(), graph.terminals().join(", ").green());
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmos_core::DbtResourceType;
    use cosmos_dbt::DbtNode;

    #[test]
    fn leaves_skip_test_nodes() {
        let nodes: NodeCollection = vec![
            DbtNode::new("parent", "parent", DbtResourceType::Model),
            DbtNode::new("test_parent", "test_parent", DbtResourceType::Test)
                .with_depends_on(["parent"]),
            DbtNode::new("child", "child", DbtResourceType::Model).with_depends_on(["parent"]),
            DbtNode::new("test_child", "test_child", DbtResourceType::Test)
                .with_depends_on(["child"]),
        ]
        .into();

        assert_eq!(task_leaves(&nodes), vec!["child".to_string()]);
    }

    #[test]
    fn parse_render_overrides() {
        let cli = Cli::try_parse_from([
            "cosmos",
            "render",
            "--test-behavior",
            "after-all",
            "--execution-mode",
            "docker",
            "--output",
            "-",
        ])
        .unwrap();

        match cli.command {
            Commands::Render { test_behavior, execution_mode, output, manifest } => {
                assert_eq!(test_behavior, Some(TestBehavior::AfterAll));
                assert_eq!(execution_mode, Some(ExecutionMode::Docker));
                assert_eq!(output, PathBuf::from("-"));
                assert!(manifest.is_none());
            }
            Commands::Leaves { .. } => panic!("expected render command"),
        }
    }

    #[test]
    fn reject_unknown_execution_mode() {
        let result = Cli::try_parse_from(["cosmos", "render", "--execution-mode", "ssh"]);
        assert!(result.is_err());
    }
}
