use anyhow::Result;
use clap::{Parser, Subcommand};
use safedb::commands::{self, BackupDeps, EXIT_FATAL, EXIT_OK};
use safedb::managers::logging::{init_console_logging, init_logging, LoggingConfig};
use safedb::storage::LogProgress;
use safedb::utils::executor::ProcessExecutor;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(name = "safedb")]
#[command(about = "Database backup orchestration with integrity checks and retention", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every configured database and apply retention
    Backup {
        /// Path to configuration file
        config: PathBuf,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate configuration file without dumping anything
    Validate {
        /// Path to configuration file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Backup { config, report } => handle_backup(config, report).await,
        Commands::Validate { config } => handle_validate(config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn handle_backup(config_path: PathBuf, report_path: Option<PathBuf>) -> Result<u8> {
    let config = safedb::config::load_config(&config_path)?;

    // Must stay alive until the run is over so buffered logs get flushed
    let _log_guard = init_logging(&LoggingConfig::from_config(&config.general))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining backups");
            on_signal.cancel();
        }
    });

    let deps = BackupDeps {
        executor: Arc::new(ProcessExecutor::new()),
        observer: Some(Arc::new(LogProgress)),
        cancel,
    };

    let report = commands::backup(&config, &config_path, report_path.as_deref(), deps).await?;

    println!("Backup {}", report.summary());
    for entry in report.entries() {
        match entry.outcome.error() {
            None => println!(
                "  ✓ {} -> {}",
                entry.database_name,
                entry.destination_key.as_deref().unwrap_or("-")
            ),
            Some(err) => println!("  ✗ {}: {}", entry.database_name, err),
        }
    }

    Ok(commands::exit_code(&report))
}

fn handle_validate(config_path: PathBuf) -> Result<u8> {
    init_console_logging();

    let report = commands::validate(&config_path)?;
    print!("{}", commands::render_validation(&report));

    Ok(if report.is_valid() { EXIT_OK } else { EXIT_FATAL })
}
