//! Headless Lane Defense battle runner.
//!
//! Runs a battle without graphics or audio and prints a JSON summary on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run a level with two defenders and update the session afterwards
//! cargo run -p td_headless -- run --data data --level data/level_1.json \
//!     --session data/session.json --deploy knight@60,0 --deploy archer@70,12
//!
//! # Check the data directory
//! cargo run -p td_headless -- validate --data data
//! ```
//!
//! Set `RUST_LOG` to override the log filter (e.g. `RUST_LOG=td_core=trace`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use td_core::math::Fixed;
use td_core::simulation::{tick_duration, Simulation};
use td_headless::loader::{self, DataSet, LoadError};
use td_headless::runner::{apply_to_session, run_battle, Deployment, RunConfig};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless Lane Defense battle runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single battle and print its summary
    Run {
        /// Directory holding the blueprint tables
        #[arg(short, long)]
        data: PathBuf,

        /// Level file to play
        #[arg(short, long)]
        level: PathBuf,

        /// RON config overriding simulation defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Session file to update with the outcome
        #[arg(short, long)]
        session: Option<PathBuf>,

        /// Game-time limit in seconds
        #[arg(long, default_value = "300")]
        seconds: u32,

        /// Seconds per tick (defaults to the real-time tick)
        #[arg(long)]
        dt: Option<f64>,

        /// Unit to place before the battle, as class@x,y (repeatable)
        #[arg(long = "deploy")]
        deployments: Vec<Deployment>,
    },

    /// Check blueprints and every level_*.json in a data directory
    Validate {
        /// Directory holding the data files
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for the JSON output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            data,
            level,
            config,
            session,
            seconds,
            dt,
            deployments,
        } => cmd_run(
            &data,
            &level,
            config.as_deref(),
            session.as_deref(),
            seconds,
            dt,
            deployments,
        ),
        Commands::Validate { data } => cmd_validate(&data),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "aborted");
            ExitCode::FAILURE
        }
    }
}

/// Run a single battle
fn cmd_run(
    data: &Path,
    level: &Path,
    config: Option<&Path>,
    session_path: Option<&Path>,
    seconds: u32,
    dt: Option<f64>,
    deployments: Vec<Deployment>,
) -> Result<ExitCode, LoadError> {
    let dt = match dt {
        Some(seconds) => Fixed::checked_from_num(seconds).unwrap_or(Fixed::ZERO),
        None => tick_duration(),
    };
    if dt <= Fixed::ZERO {
        tracing::error!(dt = %dt, "dt must be positive");
        return Ok(ExitCode::FAILURE);
    }

    let mut session = session_path.map(loader::load_session).transpose()?;
    let DataSet {
        blueprints,
        level,
        config,
    } = DataSet::load(data, level, config)?;
    let mut sim = Simulation::new(config, level, blueprints)?;

    let run = RunConfig {
        seconds,
        dt,
        deployments,
    };
    let summary = run_battle(&mut sim, &run);

    if let (Some(session), Some(path)) = (session.as_mut(), session_path) {
        if apply_to_session(session, &sim) {
            loader::save_session(path, session)?;
        } else {
            tracing::info!("battle undecided; session left unchanged");
        }
    }

    print_json(&summary);
    Ok(ExitCode::SUCCESS)
}

/// Validate a data directory
fn cmd_validate(data: &Path) -> Result<ExitCode, LoadError> {
    let report = loader::validate_data_dir(data)?;
    for problem in &report.problems {
        tracing::warn!(%problem, "data problem");
    }
    print_json(&report);
    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "failed to serialize output"),
    }
}
