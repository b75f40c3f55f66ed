//! rangectl — drive the rangeplane control plane from a shell.
//!
//! Documents live in the redb store named by `rangeplane.toml`; cluster
//! operations run against the in-process simulated backend built from the
//! `[[cluster.hosts]]` table.
//!
//! # Usage
//!
//! ```text
//! rangectl config create topology.yaml scenario.json
//! rangectl experiment create net1 --topology basic-3-node --scenario basic
//! rangectl experiment schedule net1 --algorithm round-robin
//! rangectl experiment start net1 --dry-run
//! rangectl vlan set-range net1 100 200
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::RangeConfig;

#[derive(Parser)]
#[command(
    name = "rangectl",
    about = "rangeplane — experiment orchestration control plane",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file (default: ./rangeplane.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a rangeplane.toml populated with the defaults
    Init {
        #[arg(short, long, default_value = "rangeplane.toml")]
        path: PathBuf,
    },
    /// Manage configuration documents (topologies, scenarios, ...)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage experiment lifecycles
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },
    /// Inspect and edit experiment VLAN aliases and ranges
    Vlan {
        #[command(subcommand)]
        action: VlanAction,
    },
    /// Inspect scheduling algorithms
    Scheduler {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Inspect apps available to scenarios
    App {
        #[command(subcommand)]
        action: ListAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Import documents from JSON or YAML files, upgrading older versions
    Create {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored documents, optionally of one kind
    List {
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Print a document as `kind/name`
    Get {
        target: String,
        /// Output format: json or yaml
        #[arg(short, long, default_value = "yaml")]
        output: String,
    },
    /// Delete a document given as `kind/name`
    Delete { target: String },
}

#[derive(Subcommand)]
enum ExperimentAction {
    /// Create an experiment from a stored topology and optional scenario
    Create {
        name: String,
        #[arg(short, long)]
        topology: String,
        #[arg(short, long)]
        scenario: Option<String>,
        #[arg(long)]
        base_dir: Option<PathBuf>,
        #[arg(long, default_value = "0")]
        vlan_min: u32,
        #[arg(long, default_value = "0")]
        vlan_max: u32,
    },
    /// Assign every node to a cluster host
    Schedule {
        name: String,
        #[arg(short, long, default_value = "round-robin")]
        algorithm: String,
    },
    /// Start an experiment and follow its launch
    Start {
        name: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "0")]
        vlan_min: u32,
        #[arg(long, default_value = "0")]
        vlan_max: u32,
        /// Pin a VLAN alias, as ALIAS=ID (repeatable)
        #[arg(long = "vlan")]
        vlans: Vec<String>,
    },
    Stop { name: String },
    Delete { name: String },
    List,
    Get {
        name: String,
        #[arg(short, long, default_value = "yaml")]
        output: String,
    },
}

#[derive(Subcommand)]
enum VlanAction {
    /// VLAN aliases of one experiment, or of all of them
    Aliases { experiment: Option<String> },
    /// Pin a VLAN alias of a stopped experiment to an ID
    SetAlias {
        experiment: String,
        alias: String,
        id: u32,
        /// Replace an alias that already has an ID
        #[arg(short, long)]
        force: bool,
    },
    /// VLAN ranges of one experiment, or of all of them
    Ranges { experiment: Option<String> },
    /// Set the VLAN range of a stopped experiment
    SetRange {
        experiment: String,
        min: u32,
        max: u32,
        /// Replace an existing range
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ListAction {
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,rangeplane=debug"))?,
        )
        .init();

    let cli = Cli::parse();
    if let Commands::Init { path } = &cli.command {
        return commands::init(path);
    }
    let config = RangeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config { action } => match action {
            ConfigAction::Create { files } => commands::config::create(&config, &files),
            ConfigAction::List { kind } => commands::config::list(&config, kind.as_deref()),
            ConfigAction::Get { target, output } => commands::config::get(&config, &target, &output),
            ConfigAction::Delete { target } => commands::config::delete(&config, &target),
        },
        Commands::Experiment { action } => match action {
            ExperimentAction::Create {
                name,
                topology,
                scenario,
                base_dir,
                vlan_min,
                vlan_max,
            } => {
                let mut request = rangeplane_experiment::CreateRequest::new(name, topology)
                    .with_vlan_range(vlan_min, vlan_max);
                if let Some(scenario) = scenario {
                    request = request.with_scenario(scenario);
                }
                if let Some(dir) = base_dir {
                    request = request.with_base_dir(dir);
                }
                commands::experiment::create(&config, request)
            }
            ExperimentAction::Schedule { name, algorithm } => {
                commands::experiment::schedule(&config, &name, &algorithm)
            }
            ExperimentAction::Start {
                name,
                dry_run,
                vlan_min,
                vlan_max,
                vlans,
            } => {
                let mut request = rangeplane_experiment::StartRequest::new(name)
                    .dry_run(dry_run)
                    .with_vlan_range(vlan_min, vlan_max);
                for (alias, id) in commands::experiment::parse_vlans(&vlans)? {
                    request = request.with_vlan_alias(alias, id);
                }
                commands::experiment::start(&config, request).await
            }
            ExperimentAction::Stop { name } => commands::experiment::stop(&config, &name),
            ExperimentAction::Delete { name } => commands::experiment::delete(&config, &name),
            ExperimentAction::List => commands::experiment::list(&config),
            ExperimentAction::Get { name, output } => commands::experiment::get(&config, &name, &output),
        },
        Commands::Vlan { action } => match action {
            VlanAction::Aliases { experiment } => commands::vlan::aliases(&config, experiment.as_deref()),
            VlanAction::SetAlias {
                experiment,
                alias,
                id,
                force,
            } => commands::vlan::set_alias(&config, &experiment, &alias, id, force),
            VlanAction::Ranges { experiment } => commands::vlan::ranges(&config, experiment.as_deref()),
            VlanAction::SetRange {
                experiment,
                min,
                max,
                force,
            } => commands::vlan::set_range(&config, &experiment, min, max, force),
        },
        Commands::Scheduler { action: ListAction::List } => commands::list_schedulers(&config),
        Commands::App { action: ListAction::List } => commands::list_apps(&config),
    }
}
