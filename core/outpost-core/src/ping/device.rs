//! Per-device debounce and alert latch.
//!
//! ## State Machine
//!
//! ```text
//! OK        --fail-->            DEGRADED   (count 1..threshold-1)
//! OK/DEG    --fail (count==N)--> ALERTED    fires Alert, latches
//! ALERTED   --fail-->            ALERTED    no notice
//! DEG/ALERT --success-->         OK         fires Recovery if latched and enabled
//! OK        --success-->         OK         no notice
//! ```
//!
//! The latch is set when the alert fires, not when it is delivered: a failed
//! alert mail is not retried. Likewise a failed recovery mail still resets.

use crate::config::DeviceConfig;

use super::probe::ProbeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceHealth {
    Ok,
    Degraded,
    Alerted,
}

/// What an observation asks the notifier to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Alert {
        latency_ms: Option<u64>,
        consecutive_failures: u32,
    },
    Recovery {
        latency_ms: Option<u64>,
    },
}

/// Observable result of feeding one probe into a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub notice: Option<Notice>,
    /// True for a success that ended a failure streak.
    pub recovered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMonitor {
    pub name: String,
    pub ip: String,
    consecutive_failures: u32,
    alert_latched: bool,
}

impl DeviceMonitor {
    pub fn new(name: impl Into<String>, ip: impl Into<String>) -> Self {
        DeviceMonitor {
            name: name.into(),
            ip: ip.into(),
            consecutive_failures: 0,
            alert_latched: false,
        }
    }

    pub fn from_config(device: &DeviceConfig) -> Self {
        Self::new(device.name.clone(), device.ip.clone())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn alert_latched(&self) -> bool {
        self.alert_latched
    }

    pub fn health(&self) -> DeviceHealth {
        if self.alert_latched {
            DeviceHealth::Alerted
        } else if self.consecutive_failures > 0 {
            DeviceHealth::Degraded
        } else {
            DeviceHealth::Ok
        }
    }

    /// Applies one probe result. `threshold` is at least 1.
    pub fn observe(
        &mut self,
        probe: &ProbeResult,
        threshold: u32,
        send_recovery: bool,
    ) -> Observation {
        if probe.failed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            let notice = if !self.alert_latched && self.consecutive_failures >= threshold {
                self.alert_latched = true;
                Some(Notice::Alert {
                    latency_ms: probe.latency_ms,
                    consecutive_failures: self.consecutive_failures,
                })
            } else {
                None
            };
            return Observation {
                notice,
                recovered: false,
            };
        }

        if self.consecutive_failures == 0 && !self.alert_latched {
            return Observation {
                notice: None,
                recovered: false,
            };
        }

        let notice = if self.alert_latched && send_recovery {
            Some(Notice::Recovery {
                latency_ms: probe.latency_ms,
            })
        } else {
            None
        };
        self.consecutive_failures = 0;
        self.alert_latched = false;
        Observation {
            notice,
            recovered: true,
        }
    }
}
