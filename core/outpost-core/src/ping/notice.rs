//! Alert and recovery mail text.

use super::device::{DeviceMonitor, Notice};
use crate::mail::OutgoingMail;

fn latency_text(latency_ms: Option<u64>) -> String {
    match latency_ms {
        Some(latency) => format!("{} ms", latency),
        None => "no reply".to_string(),
    }
}

pub fn compose(device: &DeviceMonitor, notice: &Notice) -> OutgoingMail {
    match notice {
        Notice::Alert {
            latency_ms,
            consecutive_failures,
        } => {
            let status = latency_text(*latency_ms);
            OutgoingMail::text(
                format!("[ALERT] {} – {}", device.name, status),
                format!(
                    "Ping Test Alert\n\n\
                     Device Name: {}\n\
                     IP Address: {}\n\
                     Status: {}\n\
                     Consecutive failures: {}\n\
                     Please investigate the device or network connection.",
                    device.name, device.ip, status, consecutive_failures
                ),
            )
        }
        Notice::Recovery { latency_ms } => {
            let status = latency_text(*latency_ms);
            OutgoingMail::text(
                format!("[RECOVERY] {} – {}", device.name, status),
                format!(
                    "Ping Recovery Notification\n\n\
                     Device Name: {}\n\
                     IP Address: {}\n\
                     Status: OK ({})\n\
                     The device has recovered.",
                    device.name, device.ip, status
                ),
            )
        }
    }
}
