//! Configuration loading for both agents.
//!
//! Each agent reads a single `config.json` from its application directory
//! (the folder holding the executable) once at startup. The parsed structs are
//! immutable and handed to the driver loops by reference.
//!
//! The folder agent's file uses snake_case keys; the ping agent's file uses
//! PascalCase keys. Both formats are kept as deployed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{MonitorError, Result};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const PAUSE_MARKER_NAME: &str = "PAUSE";
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Folder Monitor]";

const DEFAULT_MIN_FILE_AGE_SECS: u64 = 5;
const DEFAULT_MAX_ATTACHMENT_MB: f64 = 18.0;

/// Upper bound for `MaxTimeoutMs`. A single echo never waits longer than this.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

/// Returns the directory containing the running executable.
pub fn app_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| MonitorError::AppDirUnavailable(e.to_string()))?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| MonitorError::AppDirUnavailable(exe.display().to_string()))
}

/// If `raw` is absolute it is returned as-is; otherwise it is joined onto `base`.
pub fn resolve_relative_to(raw: &Path, base: &Path) -> PathBuf {
    if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    }
}

/// Lowercases an extension and makes sure it carries its leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().to_lowercase();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

fn read_json_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(MonitorError::ConfigNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| MonitorError::ConfigMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| MonitorError::ConfigMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

fn invalid(path: &Path, details: impl Into<String>) -> MonitorError {
    MonitorError::ConfigInvalid {
        path: path.to_path_buf(),
        details: details.into(),
    }
}

fn default_true() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// Mail transport settings (shared)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_starttls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_addr: String,
    pub to_addrs: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Folder agent
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderSmtpConfig {
    #[serde(flatten)]
    pub transport: SmtpSettings,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

fn default_min_file_age() -> u64 {
    DEFAULT_MIN_FILE_AGE_SECS
}

fn default_max_attachment_mb() -> f64 {
    DEFAULT_MAX_ATTACHMENT_MB
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderConfig {
    pub watch_folder: PathBuf,
    pub backup_folder: PathBuf,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    #[serde(default = "default_min_file_age")]
    pub min_file_age_seconds: u64,
    #[serde(default)]
    pub zip_before_email: bool,
    #[serde(default = "default_max_attachment_mb")]
    pub max_total_attachment_mb: f64,
    pub smtp: FolderSmtpConfig,
}

impl FolderConfig {
    /// Resolves state/log paths against `app_dir` and normalizes extensions.
    pub fn resolved(mut self, app_dir: &Path) -> Self {
        self.state_file = resolve_relative_to(&self.state_file, app_dir);
        self.log_file = resolve_relative_to(&self.log_file, app_dir);
        self.include_extensions = normalize_list(&self.include_extensions);
        self.exclude_extensions = normalize_list(&self.exclude_extensions);
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Sentinel file whose presence skips a whole cycle.
    pub fn pause_marker(&self) -> PathBuf {
        self.state_dir().join(PAUSE_MARKER_NAME)
    }

    pub fn min_file_age(&self) -> Duration {
        Duration::from_secs(self.min_file_age_seconds)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.smtp.transport.to_addrs.is_empty() {
            return Err(invalid(path, "smtp.to_addrs must list at least one recipient"));
        }
        if self.smtp.transport.host.trim().is_empty() {
            return Err(invalid(path, "smtp.host is empty"));
        }
        if !self.max_total_attachment_mb.is_finite() {
            return Err(invalid(path, "max_total_attachment_mb must be a number"));
        }
        Ok(())
    }
}

fn normalize_list(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| normalize_extension(e))
        .filter(|e| !e.is_empty())
        .collect()
}

/// Loads and validates the folder agent configuration.
pub fn load_folder_config(path: &Path, app_dir: &Path) -> Result<FolderConfig> {
    let config: FolderConfig = read_json_config(path)?;
    let config = config.resolved(app_dir);
    config.validate(path)?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ping agent
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FromAddress {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IP")]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PingConfig {
    pub to_addresses: Vec<String>,
    pub from_address: FromAddress,
    pub max_timeout_ms: u64,
    pub max_failures_before_alert: u32,
    pub ping_frequency_ms: u64,
    #[serde(default)]
    pub send_recovery_email: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    #[serde(default = "default_true")]
    pub use_start_tls: bool,
    pub devices: Vec<DeviceConfig>,
}

impl PingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.ping_frequency_ms)
    }

    /// The sender authenticates with its own address.
    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_server.clone(),
            port: self.smtp_port,
            use_starttls: self.use_start_tls,
            username: Some(self.from_address.email.clone()),
            password: Some(self.from_address.password.clone()),
            from_addr: self.from_address.email.clone(),
            to_addrs: self.to_addresses.clone(),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.to_addresses.is_empty() {
            return Err(invalid(path, "ToAddresses must list at least one recipient"));
        }
        if self.max_failures_before_alert == 0 {
            return Err(invalid(path, "MaxFailuresBeforeAlert must be at least 1"));
        }
        if self.max_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(invalid(
                path,
                format!(
                    "MaxTimeoutMs must be at most {} (got {})",
                    MAX_PROBE_TIMEOUT_MS, self.max_timeout_ms
                ),
            ));
        }
        if self.ping_frequency_ms == 0 {
            return Err(invalid(path, "PingFrequencyMs must be greater than 0"));
        }
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() || device.ip.trim().is_empty() {
                return Err(invalid(path, "every device needs a Name and an IP"));
            }
            if !seen.insert(device.ip.as_str()) {
                return Err(invalid(path, format!("duplicate device IP {}", device.ip)));
            }
        }
        Ok(())
    }
}

/// Loads and validates the ping agent configuration.
pub fn load_ping_config(path: &Path) -> Result<PingConfig> {
    let config: PingConfig = read_json_config(path)?;
    config.validate(path)?;
    Ok(config)
}
