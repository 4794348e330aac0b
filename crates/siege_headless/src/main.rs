//! Headless siegeline runner.
//!
//! # Usage
//!
//! ```bash
//! # AI-vs-AI skirmish, as fast as the CPU allows
//! cargo run -p siege_headless -- skirmish --seed 42 --red brutal --blue normal
//!
//! # Verify a seed produces the same outcome across repeated runs
//! cargo run -p siege_headless -- verify --seed 42 --runs 5
//!
//! # Host a networked match (local seat on AI) and join it from elsewhere
//! cargo run -p siege_headless -- host --port 5555
//! cargo run -p siege_headless -- join --addr 192.168.1.10:5555
//! ```
//!
//! A RON config file can set anything the flags cover; flags win on conflict.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siege_ai::Difficulty;
use siege_headless::{
    game_loop::{run_host, run_join, run_skirmish, verify_determinism, GameLoopError, MatchOutcome},
    MatchConfig,
};

#[derive(Parser)]
#[command(name = "siege_headless")]
#[command(about = "Headless siegeline match runner for AI skirmishes and network play")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Match config file (RON); flags override its fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an AI-vs-AI skirmish to completion
    Skirmish {
        /// Simulation seed
        #[arg(long)]
        seed: Option<u64>,

        /// Red AI difficulty (easy, normal, hard, brutal)
        #[arg(long)]
        red: Option<Difficulty>,

        /// Blue AI difficulty
        #[arg(long)]
        blue: Option<Difficulty>,

        /// Game-time cap in minutes
        #[arg(long)]
        minutes: Option<u32>,

        /// RON stat override file for balance experiments
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Run the same seed repeatedly and compare final checksums
    Verify {
        /// Simulation seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Game-time cap in minutes per run
        #[arg(long, default_value = "5")]
        minutes: u32,
    },

    /// Host a networked match; the local seat is AI-driven
    Host {
        /// TCP port to listen on (default 5555, or the config file's port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Local (red) AI difficulty
        #[arg(long)]
        red: Option<Difficulty>,

        /// Simulation seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Join a hosted match as the blue replica
    Join {
        /// Host address, e.g. 192.168.1.10:5555
        #[arg(short, long)]
        addr: SocketAddr,

        /// Local (blue) AI difficulty
        #[arg(long)]
        blue: Option<Difficulty>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout carries only the outcome line.
    // RUST_LOG wins when set; --verbose just raises the default.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let base = match &cli.config {
        Some(path) => match MatchConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "could not load config");
                return ExitCode::FAILURE;
            }
        },
        None => MatchConfig::default(),
    };

    let result = dispatch(cli.command, base);
    match result {
        Ok(Some(outcome)) => {
            let [red, blue] = outcome.units_standing;
            match outcome.winner {
                Some(winner) => println!(
                    "winner: {winner:?} after {} ticks (units standing: red {red}, blue {blue})",
                    outcome.ticks
                ),
                None => println!(
                    "draw after {} ticks (units standing: red {red}, blue {blue})",
                    outcome.ticks
                ),
            }
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "match runner failed");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands, base: MatchConfig) -> Result<Option<MatchOutcome>, GameLoopError> {
    match command {
        Commands::Skirmish {
            seed,
            red,
            blue,
            minutes,
            stats,
        } => {
            let config = MatchConfig {
                seed: seed.unwrap_or(base.seed),
                red_difficulty: red.unwrap_or(base.red_difficulty),
                blue_difficulty: blue.unwrap_or(base.blue_difficulty),
                max_minutes: minutes.unwrap_or(base.max_minutes),
                port: base.port,
                stat_overrides: stats.or(base.stat_overrides),
            };
            run_skirmish(&config).map(Some)
        }
        Commands::Verify {
            seed,
            runs,
            minutes,
        } => {
            let config = MatchConfig {
                seed,
                max_minutes: minutes,
                ..base
            };
            let hash = verify_determinism(&config, runs)?;
            println!("{runs} runs agreed on {hash:016x}");
            Ok(None)
        }
        Commands::Host { port, red, seed } => {
            let config = MatchConfig {
                seed: seed.unwrap_or(base.seed),
                red_difficulty: red.unwrap_or(base.red_difficulty),
                port: port.unwrap_or(base.port),
                ..base
            };
            run_host(&config).map(Some)
        }
        Commands::Join { addr, blue } => {
            let config = MatchConfig {
                blue_difficulty: blue.unwrap_or(base.blue_difficulty),
                ..base
            };
            run_join(&config, addr).map(Some)
        }
    }
}
