use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fleetwise_core::config::FleetwiseConfig;
use fleetwise_scheduler::Frequency;

mod commands;

/// Plan and validate plugin-update schedules across a fleet of sites.
#[derive(Parser, Debug)]
#[command(name = "fleetwise", version, about)]
struct Cli {
    /// Path to fleetwise.toml. Defaults to ~/.fleetwise/fleetwise.toml.
    #[arg(long, env = "FLEETWISE_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the next run of a daily or weekly cadence.
    NextRun(CadenceArgs),

    /// Strip the display suffix from a route-level schedule id.
    Normalize {
        id: String,
    },

    /// List every schedule in a snapshot with its display id.
    List {
        /// Aggregated snapshot JSON file.
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Report time and plugin collisions for a proposed schedule.
    Check(SelectionArgs),

    /// Validate a proposed schedule and print the create/edit/delete plan.
    Plan(SelectionArgs),

    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug)]
struct CadenceArgs {
    #[arg(long, default_value = "daily")]
    frequency: Frequency,

    /// Day name, only used for weekly schedules.
    #[arg(long)]
    weekday: Option<String>,

    /// Local time as HH:MM. Minutes are ignored.
    #[arg(long)]
    time: String,
}

#[derive(Args, Debug)]
struct SelectionArgs {
    #[arg(long)]
    snapshot: PathBuf,

    /// Schedule being edited, canonical or display form.
    #[arg(long)]
    schedule_id: Option<String>,

    /// Comma-separated site ids that should carry the schedule.
    #[arg(long, value_delimiter = ',')]
    sites: Vec<String>,

    /// Comma-separated plugin slugs.
    #[arg(long, value_delimiter = ',')]
    plugins: Vec<String>,

    #[command(flatten)]
    cadence: CadenceArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // config first so the log filter can come from it
    let loaded = FleetwiseConfig::load(cli.config.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => FleetwiseConfig::default(),
    };

    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = loaded {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    match cli.command {
        Command::NextRun(cadence) => commands::next_run(&cadence),
        Command::Normalize { id } => commands::normalize(&id),
        Command::List { snapshot } => commands::list(&snapshot).await,
        Command::Check(selection) => commands::check(&selection).await,
        Command::Plan(selection) => commands::plan(&selection).await,
        Command::Config => commands::show_config(&config),
    }
}
