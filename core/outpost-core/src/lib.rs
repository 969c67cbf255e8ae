//! # outpost-core
//!
//! Shared engine for two small operational monitors:
//!
//! - the **folder agent** relays new files from a watched directory by mail,
//!   then moves them into a backup folder;
//! - the **ping agent** probes hosts on an interval and mails an alert after a
//!   run of failures, plus a recovery notice when they answer again.
//!
//! ## Design Principles
//!
//! - **Synchronous**: plain threads, no async runtime.
//! - **Graceful degradation**: unreadable state loads as empty and a failed
//!   send is logged before the cycle moves on.
//! - **Configuration is fatal, everything else is not**: only
//!   [`MonitorError::is_config_error`] errors end a process with a non-zero code.
//! - **Seams as traits**: [`mail::Mailer`] and [`ping::Prober`] let tests run
//!   the full cycles without SMTP or ICMP.

pub mod config;
pub mod error;
pub mod folder;
pub mod lock;
pub mod logging;
pub mod mail;
pub mod ping;
pub mod shutdown;

pub use config::{FolderConfig, PingConfig, SmtpSettings};
pub use error::{MonitorError, Result};
pub use mail::{Mailer, OutgoingMail, SmtpMailer};
pub use shutdown::ShutdownToken;
