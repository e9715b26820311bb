//! Faultline CLI - deduplicate and escalate recurring faults.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::FaultlineConfig;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Deduplicate and escalate recurring application faults")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "faultline.toml")]
    config: PathBuf,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fault id of a signature
    Id {
        project: String,
        exception_type: String,
        exception_class: String,
        exception_message: String,
    },

    /// Run faults from a JSON lines file through the full pipeline
    Replay {
        file: PathBuf,

        /// Log notifications instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a stored fault record as JSON
    Inspect { id: String },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = FaultlineConfig::load(&cli.config)?;
    init_tracing(cli.json_logs || config.log.json);

    match cli.command {
        Commands::Id {
            project,
            exception_type,
            exception_class,
            exception_message,
        } => {
            commands::id::run(&project, &exception_type, &exception_class, &exception_message);
            Ok(())
        }
        Commands::Replay { file, dry_run } => commands::replay::run(&config, &file, dry_run).await,
        Commands::Inspect { id } => commands::inspect::run(&config, &id).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
