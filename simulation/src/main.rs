//! Ferry simulation runner
//!
//! Runs store-carry-forward scenarios over intermittent mesh links and
//! prints what got delivered.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use ferry_logging::{FerrySubscriberBuilder, LogConfig};
use ferry_simulation::{ChaosOptions, DtnConfig, MeshBuilder, Simulation, scenarios};

#[derive(Parser)]
#[command(
    name = "ferry-sim",
    about = "Store-carry-forward simulation over intermittent mesh links",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Node configuration file (JSON); defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// First node sends to the last along a line; the reply walks back
    Line {
        /// Number of nodes (max 26)
        #[arg(short, long, default_value = "5")]
        peers: usize,
    },

    /// A second message follows the relay learned from the first reply
    Learned,

    /// Random mesh with flapping links and random traffic
    Chaos {
        /// Number of nodes (max 26)
        #[arg(short, long, default_value = "8")]
        peers: usize,

        /// Number of ticks to run
        #[arg(short, long, default_value = "200")]
        ticks: u64,

        /// Chance of a potential link being up on any tick
        #[arg(short, long, default_value = "0.3")]
        link_probability: f64,

        /// Messages injected over the first half of the run
        #[arg(short, long, default_value = "20")]
        messages: usize,

        /// Seed for topology, traffic and link flapping
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Create and visualize a topology
    Topology {
        /// Type of topology: line, ring, star, full, random
        #[arg(short, long, default_value = "ring")]
        topology: String,

        /// Number of nodes (max 26)
        #[arg(short, long, default_value = "6")]
        peers: usize,

        /// Connection probability for random topology
        #[arg(long, default_value = "0.4")]
        connection_prob: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let _log_guard = FerrySubscriberBuilder::new()
        .with_config(LogConfig::development())
        .with_level(level)
        .try_init()?;

    let dtn = match &cli.config {
        Some(path) => load_config(path)?,
        None => DtnConfig::default(),
    };

    let sim = match cli.command {
        Commands::Line { peers } => scenarios::line_relay(peers, dtn)?,
        Commands::Learned => scenarios::learned_route(dtn)?,
        Commands::Chaos {
            peers,
            ticks,
            link_probability,
            messages,
            seed,
        } => {
            let options = ChaosOptions {
                peers,
                ticks,
                link_probability,
                messages,
                seed,
            };
            scenarios::chaos(&options, dtn)?
        }
        Commands::Topology {
            topology,
            peers,
            connection_prob,
        } => {
            let builder = MeshBuilder::new(peers);
            let mesh = match topology.as_str() {
                "line" => builder.line(),
                "ring" => builder.ring(),
                "star" => builder.star(),
                "full" => builder.full_mesh(),
                "random" => builder.random(connection_prob),
                other => anyhow::bail!("Unknown topology: {other}"),
            };
            println!("{}", mesh.visualize());
            return Ok(());
        }
    };

    report(&sim);
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<DtnConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: DtnConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;

    for warning in config.validate() {
        warn!(%warning, "Questionable node configuration");
    }
    Ok(config)
}

fn report(sim: &Simulation) {
    println!("{}", sim.mesh.visualize());
    println!("=== Final State ===");
    println!("  {}", sim.state_summary());
    println!("\n=== Final Statistics ===");
    print!("{}", sim.stats);
}
