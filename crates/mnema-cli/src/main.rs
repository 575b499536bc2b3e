//! mnema: replay scripted operations against an agentic memory network.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mnema_cli::{build_system, check_graph, load_script, logging, BackendKind, Replayer};
use mnema_core::MemoryConfig;

#[derive(Parser)]
#[command(name = "mnema")]
#[command(author, version, about = "Agentic memory network replay tool")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines script, printing one JSON result per operation
    Replay {
        /// Script file (one operation per line)
        #[arg(short, long)]
        script: PathBuf,

        /// Validate graph invariants after the replay
        #[arg(long)]
        check: bool,
    },

    /// Replay a script and print only the graph invariant report
    Check {
        /// Script file (one operation per line)
        #[arg(short, long)]
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when a requested graph check found violations.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let system = Arc::new(build_system(
        BackendKind::from_env()?,
        MemoryConfig::from_env(),
    )?);
    let mut replayer = Replayer::new(system.clone());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let check = match cli.command {
        Commands::Replay { script, check } => {
            for step in load_script(&script)? {
                let outcome = replayer.apply(step).await;
                writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
            }
            check
        }
        Commands::Check { script } => {
            replayer.run(load_script(&script)?).await;
            true
        }
    };

    if !check {
        return Ok(true);
    }
    let report = check_graph(&system);
    writeln!(out, "{}", serde_json::to_string(&report)?)?;
    Ok(report.is_consistent())
}
