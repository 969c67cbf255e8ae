//! ping-monitor: probes configured hosts and emails alerts on sustained failure.
//!
//! A background worker runs the probe loop; the main thread waits for Ctrl+C
//! or SIGTERM, signals the worker and gives it a few seconds to finish.
//! Only one instance runs per application directory.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use clap::Parser;
use outpost_core::config::{self, CONFIG_FILE_NAME};
use outpost_core::lock::InstanceLock;
use outpost_core::ping::{CommandProber, PingMonitor};
use outpost_core::{logging, MonitorError, ShutdownToken, SmtpMailer};
use tracing::{error, info, warn};

const LOG_FILE_NAME: &str = "ping_monitor.log";
const LOCK_NAME: &str = "ping-monitor";
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ping-monitor")]
#[command(about = "Ping hosts on an interval and email alerts on sustained failure")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to the executable's directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file (defaults to ping_monitor.log beside the executable)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
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

    let config = match config::load_ping_config(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            logging::init_console();
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let log_path = cli
        .log_file
        .map(|p| config::resolve_relative_to(&p, &app_dir))
        .unwrap_or_else(|| app_dir.join(LOG_FILE_NAME));
    let _logging_guard = logging::init_with_file(&log_path);

    let _instance_lock = match InstanceLock::acquire(&app_dir, LOCK_NAME) {
        Ok(lock) => Some(lock),
        Err(MonitorError::AlreadyRunning { pid, .. }) => {
            info!(pid, "Ping Monitor is already running in the background.");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            warn!(error = %e, "Could not take the instance lock; continuing without it");
            None
        }
    };

    let shutdown = ShutdownToken::new();
    let stop_requested = Arc::new(AtomicBool::new(false));
    let signal_token = shutdown.clone();
    let signal_flag = Arc::clone(&stop_requested);
    if let Err(e) = ctrlc::set_handler(move || {
        signal_flag.store(true, Ordering::SeqCst);
        signal_token.cancel();
    }) {
        warn!(error = %e, "Failed to install signal handler");
    }

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let worker_token = shutdown.clone();
    let mailer = SmtpMailer::new(config.smtp_settings());
    let worker = thread::Builder::new()
        .name("ping-worker".to_string())
        .spawn(move || {
            // A worker that returns or panics also wakes the main thread.
            let _cancel_on_exit = worker_token.cancel_on_drop();
            let mut monitor = PingMonitor::new(config, CommandProber, mailer);
            monitor.run(&worker_token);
            let _ = done_tx.send(());
        });
    let worker = match worker {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to start ping worker");
            return ExitCode::FAILURE;
        }
    };

    shutdown.wait();
    if !stop_requested.load(Ordering::SeqCst) {
        let panicked = worker.join().is_err();
        error!(panicked, "Ping worker stopped unexpectedly; exiting");
        return ExitCode::FAILURE;
    }
    info!("Stop requested");

    match done_rx.recv_timeout(WORKER_JOIN_TIMEOUT) {
        Ok(()) => {
            let _ = worker.join();
        }
        Err(_) => warn!(
            timeout_secs = WORKER_JOIN_TIMEOUT.as_secs(),
            "Ping worker did not stop in time"
        ),
    }

    info!("STOP");
    ExitCode::SUCCESS
}
