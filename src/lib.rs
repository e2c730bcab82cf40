pub mod cli;
pub mod config;
pub mod errors;
pub mod filter;
pub mod history;
pub mod models;
pub mod persistence;
pub mod render;
pub mod session;
pub mod store;
pub mod tracker;
pub mod undo;

use crate::cli::{Cli, Command};
use crate::config::AppSettings;
use crate::tracker::Tracker;
use clap::Parser;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = AppSettings::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    init_tracing(&settings.log_dir, &settings.log_filter).map_err(anyhow::Error::msg)?;

    let session_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("med_tracker", session_id = %session_id);
    let _entered = span.enter();
    tracing::info!(data_file = %settings.data_file.display(), "starting");

    let mut tracker = Tracker::new(settings);
    match cli.command.unwrap_or(Command::Session) {
        Command::Session => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            session::run(&mut tracker, stdin.lock(), &mut stdout)?;
        }
        Command::List(command) => {
            let mut stdout = io::stdout();
            cli::run_once(&mut tracker, command, &mut stdout)?;
        }
    }
    Ok(())
}

fn init_tracing(log_dir: &Path, default_filter: &str) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "med-tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
