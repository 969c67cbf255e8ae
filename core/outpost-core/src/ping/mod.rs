//! Reachability agent: probes hosts on an interval and mails alerts on
//! sustained failure, with an optional recovery notice.
//!
//! Device state lives only in memory. A restart re-arms every latch.

mod device;
mod monitor;
mod notice;
mod probe;

pub use device::{DeviceHealth, DeviceMonitor, Notice, Observation};
pub use monitor::{CycleReport, PingMonitor};
pub use notice::compose;
pub use probe::{parse_latency_ms, CommandProber, ProbeResult, Prober, PROBE_GRACE_MS};
