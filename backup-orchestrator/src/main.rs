//! Backup Orchestrator - Main entry point

use anyhow::Result;
use backup_orchestrator::{utils, Config, Orchestrator};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backup profile to run
    #[arg(short, long, required_unless_present_any = ["list", "restore"])]
    profile: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Load and validate configuration, then exit without backing up
    #[arg(long)]
    test: bool,

    /// List local snapshots
    #[arg(long)]
    list: bool,

    /// Restore a local snapshot by run id
    #[arg(long, value_name = "RUN_ID", requires = "target")]
    restore: Option<String>,

    /// Directory to restore into
    #[arg(long, value_name = "DIR")]
    target: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            let level = if args.verbose { "debug" } else { "info" };
            match utils::logger::init(level, None) {
                Ok(()) => error!("{}", e),
                Err(log_err) => {
                    eprintln!("Failed to initialize logging: {}", log_err);
                    eprintln!("{}", e);
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let level = if args.verbose { "debug" } else { config.log.level.as_str() };
    if let Err(e) = utils::logger::init(level, config.log.file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Starting backup-orchestrator v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    tokio::select! {
        result = execute(args, config) => match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = wait_for_interrupt() => {
            warn!("Backup interrupted by user");
            ExitCode::FAILURE
        }
    }
}

/// Run the requested action; `Ok(false)` means it completed but did not succeed
async fn execute(args: Args, config: Config) -> Result<bool> {
    let orchestrator = Orchestrator::new(config)?;

    if args.test {
        info!(
            "Configuration is valid ({} profiles)",
            orchestrator.config().profiles.len()
        );
        return Ok(true);
    }

    if args.list {
        let snapshots = orchestrator.list_snapshots().await?;
        if snapshots.is_empty() {
            println!("No local snapshots found");
        }
        for snapshot in snapshots {
            println!(
                "{}  {:<8}  {:<16}  {}  {} files",
                snapshot.run_id,
                snapshot.layout.as_str(),
                snapshot.profile,
                snapshot.created_at.to_rfc3339(),
                snapshot.files_stored
            );
        }
        return Ok(true);
    }

    if let (Some(run_id), Some(target)) = (args.restore.as_deref(), args.target.as_deref()) {
        let restored = orchestrator.restore(run_id, target).await?;
        return Ok(restored > 0);
    }

    let profile = args
        .profile
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--profile is required"))?;
    let run = orchestrator.run_profile(profile).await?;
    Ok(run.success)
}

/// Resolves on Ctrl+C (or SIGTERM on unix)
async fn wait_for_interrupt() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
