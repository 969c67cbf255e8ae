//! Reachability sampler: one echo request per call, bounded in time.
//!
//! Any probe that errors, times out or prints something unparseable is a
//! "no reply". Probe errors never escape this module.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use wait_timeout::ChildExt;

/// Added on top of the latency threshold before the ping process is killed,
/// so "no reply" and "process hung" stay distinguishable.
pub const PROBE_GRACE_MS: u64 = 1_000;

// Matches `time=12ms`, `time<1ms` (Windows) and `time=0.045 ms` (Unix).
static RE_LATENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub latency_ms: Option<u64>,
    pub failed: bool,
}

impl ProbeResult {
    /// A reply slower than `timeout_ms` still counts as a failure. A reply of
    /// exactly `timeout_ms` does not.
    pub fn classify(latency_ms: Option<u64>, timeout_ms: u64) -> Self {
        let failed = match latency_ms {
            Some(latency) => latency > timeout_ms,
            None => true,
        };
        ProbeResult { latency_ms, failed }
    }

    pub fn no_reply() -> Self {
        ProbeResult {
            latency_ms: None,
            failed: true,
        }
    }
}

/// Extracts round-trip latency in whole milliseconds, rounding fractions up.
pub fn parse_latency_ms(output: &str) -> Option<u64> {
    let captures = RE_LATENCY.captures(output)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.ceil() as u64)
}

pub trait Prober: Send + Sync {
    fn probe(&self, ip: &str, timeout_ms: u64) -> ProbeResult;
}

/// Shells out to the system `ping`.
#[derive(Debug, Clone, Default)]
pub struct CommandProber;

/// How long `ping` itself is told to wait for a reply.
fn reply_wait_ms(timeout_ms: u64) -> u64 {
    timeout_ms.saturating_add(PROBE_GRACE_MS)
}

/// Process-level bound: the ping's own wait plus one more grace period.
fn process_bound(timeout_ms: u64) -> Duration {
    Duration::from_millis(reply_wait_ms(timeout_ms).saturating_add(PROBE_GRACE_MS))
}

impl CommandProber {
    fn command(ip: &str, timeout_ms: u64) -> Command {
        let mut command = Command::new("ping");
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command
                .args(["-n", "1", "-w"])
                .arg(reply_wait_ms(timeout_ms).to_string())
                .creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(target_os = "macos")]
        {
            command
                .args(["-c", "1", "-W"])
                .arg(reply_wait_ms(timeout_ms).to_string());
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let wait_secs = reply_wait_ms(timeout_ms).div_ceil(1_000).max(1);
            command
                .args(["-c", "1", "-W"])
                .arg(wait_secs.to_string());
        }
        command.arg(ip);
        command
    }

    fn run(ip: &str, timeout_ms: u64) -> std::io::Result<Option<String>> {
        let mut child = Self::command(ip, timeout_ms)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        match child.wait_timeout(process_bound(timeout_ms))? {
            Some(_status) => {
                let mut output = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout.read_to_string(&mut output)?;
                }
                Ok(Some(output))
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Ok(None)
            }
        }
    }
}

impl Prober for CommandProber {
    fn probe(&self, ip: &str, timeout_ms: u64) -> ProbeResult {
        match Self::run(ip, timeout_ms) {
            Ok(Some(output)) => ProbeResult::classify(parse_latency_ms(&output), timeout_ms),
            Ok(None) => {
                debug!(ip, "Ping process exceeded its time bound");
                ProbeResult::no_reply()
            }
            Err(e) => {
                debug!(ip, error = %e, "Ping process failed");
                ProbeResult::no_reply()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows_output() {
        let out = "Reply from 192.168.1.1: bytes=32 time=12ms TTL=64";
        assert_eq!(parse_latency_ms(out), Some(12));
        let fast = "Reply from 192.168.1.1: bytes=32 time<1ms TTL=64";
        assert_eq!(parse_latency_ms(fast), Some(1));
    }

    #[test]
    fn parses_unix_output_rounding_up() {
        let out = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms";
        assert_eq!(parse_latency_ms(out), Some(1));
        let slow = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=200.2 ms";
        assert_eq!(parse_latency_ms(slow), Some(201));
    }

    #[test]
    fn unparseable_output_has_no_latency() {
        assert_eq!(parse_latency_ms("Request timed out."), None);
        assert_eq!(parse_latency_ms(""), None);
    }

    #[test]
    fn wait_bounds_saturate_on_huge_timeouts() {
        assert_eq!(reply_wait_ms(200), 1_200);
        assert_eq!(process_bound(200), Duration::from_millis(2_200));
        assert_eq!(reply_wait_ms(u64::MAX), u64::MAX);
        assert_eq!(process_bound(u64::MAX), Duration::from_millis(u64::MAX));

        let command = CommandProber::command("127.0.0.1", u64::MAX);
        let last_arg = command.get_args().last().map(|a| a.to_string_lossy().to_string());
        assert_eq!(last_arg.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn latency_equal_to_threshold_is_success() {
        let at = ProbeResult::classify(Some(200), 200);
        assert!(!at.failed);
        let over = ProbeResult::classify(Some(201), 200);
        assert!(over.failed);
        let none = ProbeResult::classify(None, 200);
        assert!(none.failed);
    }
}
