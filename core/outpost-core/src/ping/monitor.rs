//! Reachability driver loop.
//!
//! Probes every configured device once per interval, feeds the result into
//! that device's state machine and sends whatever notice falls out. The stop
//! token is checked between devices and during the inter-cycle sleep, so
//! shutdown waits for at most one probe.

use std::sync::Arc;

use tracing::{info, warn};

use super::device::{DeviceMonitor, Notice};
use super::notice::compose;
use super::probe::{ProbeResult, Prober};
use crate::config::PingConfig;
use crate::mail::Mailer;
use crate::shutdown::ShutdownToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub alerts_sent: usize,
    pub recoveries_sent: usize,
    pub delivery_failures: usize,
    pub interrupted: bool,
}

pub struct PingMonitor<P: Prober, M: Mailer> {
    config: Arc<PingConfig>,
    devices: Vec<DeviceMonitor>,
    prober: P,
    mailer: M,
}

fn failure_status(result: &ProbeResult) -> String {
    match result.latency_ms {
        Some(latency) => format!("{} ms (slow)", latency),
        None => "timeout".to_string(),
    }
}

impl<P: Prober, M: Mailer> PingMonitor<P, M> {
    /// Every device starts OK: counters and latches are not persisted.
    pub fn new(config: Arc<PingConfig>, prober: P, mailer: M) -> Self {
        let devices = config.devices.iter().map(DeviceMonitor::from_config).collect();
        PingMonitor {
            config,
            devices,
            prober,
            mailer,
        }
    }

    pub fn devices(&self) -> &[DeviceMonitor] {
        &self.devices
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// One pass over all devices.
    pub fn run_cycle(&mut self, shutdown: &ShutdownToken) -> CycleReport {
        let mut report = CycleReport::default();
        let timeout_ms = self.config.max_timeout_ms;
        let threshold = self.config.max_failures_before_alert;
        let send_recovery = self.config.send_recovery_email;

        for device in self.devices.iter_mut() {
            if shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let result = self.prober.probe(&device.ip, timeout_ms);
            report.probed += 1;
            if result.failed {
                info!(
                    device = %device.name,
                    ip = %device.ip,
                    "{}: FAIL ({}) count={}",
                    device.name,
                    failure_status(&result),
                    device.consecutive_failures().saturating_add(1)
                );
            } else {
                info!(
                    device = %device.name,
                    ip = %device.ip,
                    "{}: OK ({} ms)",
                    device.name,
                    result.latency_ms.unwrap_or_default()
                );
            }

            let observation = device.observe(&result, threshold, send_recovery);
            if observation.recovered {
                info!(
                    device = %device.name,
                    "{}: RECOVERED ({} ms)",
                    device.name,
                    result.latency_ms.unwrap_or_default()
                );
            }

            let Some(notice) = observation.notice else {
                continue;
            };
            let mail = compose(device, &notice);
            let kind = match notice {
                Notice::Alert { .. } => "ALERT",
                Notice::Recovery { .. } => "Recovery",
            };
            match self.mailer.send(&mail) {
                Ok(()) => {
                    info!(device = %device.name, "{}: {} email sent.", device.name, kind);
                    match notice {
                        Notice::Alert { .. } => report.alerts_sent += 1,
                        Notice::Recovery { .. } => report.recoveries_sent += 1,
                    }
                }
                Err(e) => {
                    warn!(device = %device.name, error = %e, "{}: {} email failed", device.name, kind);
                    report.delivery_failures += 1;
                }
            }
        }

        report
    }

    /// Runs cycles until the token is cancelled.
    pub fn run(&mut self, shutdown: &ShutdownToken) {
        let interval = self.config.interval();
        info!(
            devices = self.devices.len(),
            interval_secs = interval.as_secs_f64(),
            threshold = self.config.max_failures_before_alert,
            max_timeout_ms = self.config.max_timeout_ms,
            "START: {} device(s), every {:.1}s; alert after {} fails (> {}ms or no reply).",
            self.devices.len(),
            interval.as_secs_f64(),
            self.config.max_failures_before_alert,
            self.config.max_timeout_ms
        );

        while !shutdown.is_cancelled() {
            self.run_cycle(shutdown);
            if shutdown.wait_timeout(interval) {
                break;
            }
        }
    }
}
