//! folder-monitor: relays new files from a watched folder by email.
//!
//! Runs one pass and exits; schedule it externally (cron, Task Scheduler).
//! Reads `config.json` from the executable's directory unless `--config` is
//! given. Exits non-zero only when the configuration cannot be loaded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use outpost_core::config::{self, CONFIG_FILE_NAME};
use outpost_core::folder::{CycleOutcome, FolderRun};
use outpost_core::{logging, SmtpMailer};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "folder-monitor")]
#[command(about = "Email new files from a watched folder, then move them to a backup folder")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to the executable's directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let app_dir = match config::app_dir() {
        Ok(dir) => dir,
        Err(e) => {
            logging::init_console();
            error!(error = %e, "Failed to resolve application directory");
            return ExitCode::FAILURE;
        }
    };
    let config_path = cli.config.unwrap_or_else(|| app_dir.join(CONFIG_FILE_NAME));

    let config = match config::load_folder_config(&config_path, &app_dir) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console();
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = logging::init_with_file(&config.log_file);
    println!("FolderMonitor is running... checking for new files.");
    info!(config = %config_path.display(), "Starting Folder Monitor");

    let mailer = SmtpMailer::new(config.smtp.transport.clone());
    match FolderRun::new(&config, &mailer).run() {
        Ok(CycleOutcome::Delivered {
            delivered,
            moved,
            failed_moves,
            already_delivered,
        }) => info!(
            delivered,
            moved = moved.len(),
            failed_moves = failed_moves.len(),
            already_delivered = already_delivered.len(),
            "Cycle complete"
        ),
        Ok(outcome) => info!(?outcome, "Cycle complete"),
        // Per-cycle failures are logged, never escalated to the exit code.
        Err(e) => error!(error = %e, "Folder cycle failed"),
    }

    println!("FolderMonitor finished. You can close this window.");
    ExitCode::SUCCESS
}
