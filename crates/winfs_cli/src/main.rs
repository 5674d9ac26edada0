//! winfs - Unicode-aware file commands
//!
//! Runs one filesystem verb through the name service, falling back to the
//! native filesystem the same way the library does.

mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use winfs::{WinFs, WinFsConfig};

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve relative paths against this directory
    #[arg(long)]
    base: Option<String>,

    /// Do not use the name service
    #[arg(long)]
    no_service: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => WinFsConfig::load_from(path)?,
        None => WinFsConfig::load().unwrap_or_default(),
    };
    if let Some(base) = args.base {
        config.path.base_dir = Some(base);
    }
    if args.no_service {
        config.service.enabled = false;
    }

    let level = if args.debug { "debug" } else { config.log.level.as_str() };
    let _guard = winfs_log::init_logging(level, config.log.file)?;

    if config.log.file {
        if let Err(e) = winfs_log::cleanup_old_logs(config.log.retain_days) {
            tracing::warn!("Failed to cleanup old logs: {}", e);
        }
    }

    let fs = WinFs::from_config(&config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = commands::run(&fs, args.command, &mut stdin.lock(), &mut stdout.lock());

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is_recoverable() => {
            eprintln!("winfs: {}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
