//! caus - causal analysis over aligned telemetry

mod commands;
mod config;
mod logging;
mod window;

use crate::commands::Session;
use crate::config::CliConfig;
use crate::window::WindowArgs;
use caus_sdk::DiscoverOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "caus",
    version,
    about = "Align telemetry variables and run causal discovery, estimation and simulation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Variables file
    #[arg(long, default_value = "variables.yaml", global = true)]
    vars: PathBuf,

    /// Causal engine address; overrides CAUS_ENGINE_ADDRESS
    #[arg(long, global = true)]
    engine: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover a causal graph
    Discover {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum lag in steps
        #[arg(long, default_value_t = 3)]
        lag: i32,
        /// Significance level in (0, 1]
        #[arg(long, default_value_t = 0.05)]
        alpha: f32,
        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },
    /// Estimate per-node coefficients for a graph
    Estimate {
        #[command(flatten)]
        window: WindowArgs,
        /// Graph JSON written by `discover --json`
        #[arg(long)]
        graph: PathBuf,
    },
    /// Simulate an intervention
    Simulate {
        #[command(flatten)]
        window: WindowArgs,
        /// Graph JSON written by `discover --json`
        #[arg(long)]
        graph: PathBuf,
        /// Intervention, e.g. "front_calls * 1.2" or "front_calls = 500"
        #[arg(long = "do")]
        intervention: String,
        /// Simulated steps
        #[arg(long, default_value_t = 10)]
        horizon: i32,
        /// Variable to summarize; prints raw JSON when omitted
        #[arg(long)]
        effect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load()?;
    if let Some(engine) = cli.engine {
        config.engine_address = engine;
    }
    logging::init(cli.log_level.as_deref().unwrap_or(&config.log_level))?;

    match cli.command {
        Commands::Discover {
            window,
            lag,
            alpha,
            json,
        } => {
            let session = Session::open(&config, &cli.vars, &window)?;
            commands::discover::execute(&session, DiscoverOptions::new(lag, alpha), json).await
        }
        Commands::Estimate { window, graph } => {
            let session = Session::open(&config, &cli.vars, &window)?;
            commands::estimate::execute(&session, &graph).await
        }
        Commands::Simulate {
            window,
            graph,
            intervention,
            horizon,
            effect,
        } => {
            let session = Session::open(&config, &cli.vars, &window)?;
            commands::simulate::execute(&session, &graph, &intervention, horizon, effect.as_deref())
                .await
        }
    }
}
