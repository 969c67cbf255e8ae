//! Integration tests for the reachability loop with scripted probes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use outpost_core::config::{DeviceConfig, FromAddress, PingConfig};
use outpost_core::ping::{DeviceHealth, PingMonitor, ProbeResult, Prober};
use outpost_core::{Mailer, MonitorError, OutgoingMail, ShutdownToken};

/// Replays queued results per IP; an empty queue answers 10 ms.
/// Clones share the script so tests keep a handle after moving one in.
#[derive(Clone, Default)]
struct ScriptedProber {
    script: Arc<Mutex<HashMap<String, VecDeque<ProbeResult>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProber {
    fn push(&self, ip: &str, results: &[ProbeResult]) {
        self.script
            .lock()
            .expect("script lock")
            .entry(ip.to_string())
            .or_default()
            .extend(results.iter().copied());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Prober for ScriptedProber {
    fn probe(&self, ip: &str, timeout_ms: u64) -> ProbeResult {
        self.calls.lock().expect("calls lock").push(ip.to_string());
        self.script
            .lock()
            .expect("script lock")
            .get_mut(ip)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ProbeResult::classify(Some(10), timeout_ms))
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("mailer lock")
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> outpost_core::Result<()> {
        self.sent.lock().expect("mailer lock").push(mail.clone());
        if self.fail {
            return Err(MonitorError::Delivery("relay unavailable".to_string()));
        }
        Ok(())
    }
}

fn config(devices: &[(&str, &str)], send_recovery: bool) -> Arc<PingConfig> {
    Arc::new(PingConfig {
        to_addresses: vec!["ops@example.com".to_string()],
        from_address: FromAddress {
            email: "monitor@example.com".to_string(),
            password: "secret".to_string(),
        },
        max_timeout_ms: 200,
        max_failures_before_alert: 3,
        ping_frequency_ms: 10,
        send_recovery_email: send_recovery,
        smtp_server: "smtp.example.com".to_string(),
        smtp_port: 587,
        use_start_tls: true,
        devices: devices
            .iter()
            .map(|(name, ip)| DeviceConfig {
                name: name.to_string(),
                ip: ip.to_string(),
            })
            .collect(),
    })
}

fn fail() -> ProbeResult {
    ProbeResult::no_reply()
}

fn ok(ms: u64) -> ProbeResult {
    ProbeResult::classify(Some(ms), 200)
}

#[test]
fn alert_fires_once_then_recovery_resets() {
    let prober = ScriptedProber::default();
    prober.push("192.168.1.1", &[fail(), fail(), fail(), fail(), ok(12)]);
    let mut monitor = PingMonitor::new(
        config(&[("Router", "192.168.1.1")], true),
        prober.clone(),
        RecordingMailer::default(),
    );
    let token = ShutdownToken::new();

    monitor.run_cycle(&token);
    monitor.run_cycle(&token);
    assert!(monitor.mailer().subjects().is_empty());

    let third = monitor.run_cycle(&token);
    assert_eq!(third.alerts_sent, 1);
    let sent = monitor.mailer().sent.lock().expect("mailer lock").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[ALERT] Router – no reply");
    assert!(sent[0].body.contains("Consecutive failures: 3"));

    let fourth = monitor.run_cycle(&token);
    assert_eq!(fourth.alerts_sent, 0);
    assert_eq!(monitor.mailer().subjects().len(), 1);
    assert_eq!(monitor.devices()[0].consecutive_failures(), 4);

    let fifth = monitor.run_cycle(&token);
    assert_eq!(fifth.recoveries_sent, 1);
    assert_eq!(
        monitor.mailer().subjects(),
        vec!["[ALERT] Router – no reply", "[RECOVERY] Router – 12 ms"]
    );
    assert_eq!(monitor.devices()[0].health(), DeviceHealth::Ok);
    assert_eq!(monitor.devices()[0].consecutive_failures(), 0);
}

#[test]
fn failed_alert_delivery_still_latches() {
    let prober = ScriptedProber::default();
    prober.push("10.0.0.5", &[fail(), fail(), fail(), fail()]);
    let mailer = RecordingMailer {
        fail: true,
        ..RecordingMailer::default()
    };
    let mut monitor = PingMonitor::new(config(&[("NAS", "10.0.0.5")], false), prober, mailer);
    let token = ShutdownToken::new();

    let mut failures = 0;
    for _ in 0..4 {
        failures += monitor.run_cycle(&token).delivery_failures;
    }

    assert_eq!(failures, 1);
    assert_eq!(monitor.mailer().subjects().len(), 1);
    assert!(monitor.devices()[0].alert_latched());
}

#[test]
fn failed_recovery_delivery_still_resets() {
    let prober = ScriptedProber::default();
    prober.push("10.0.0.5", &[fail(), fail(), fail(), ok(9)]);
    let mailer = RecordingMailer {
        fail: true,
        ..RecordingMailer::default()
    };
    let mut monitor = PingMonitor::new(config(&[("NAS", "10.0.0.5")], true), prober, mailer);
    let token = ShutdownToken::new();

    let mut failures = 0;
    for _ in 0..4 {
        failures += monitor.run_cycle(&token).delivery_failures;
    }

    assert_eq!(failures, 2);
    assert_eq!(
        monitor.mailer().subjects(),
        vec!["[ALERT] NAS – no reply", "[RECOVERY] NAS – 9 ms"]
    );
    assert_eq!(monitor.devices()[0].consecutive_failures(), 0);
    assert!(!monitor.devices()[0].alert_latched());
    assert_eq!(monitor.devices()[0].health(), DeviceHealth::Ok);
}

#[test]
fn devices_are_tracked_independently() {
    let prober = ScriptedProber::default();
    prober.push("192.168.1.1", &[fail(), fail(), fail()]);
    let mut monitor = PingMonitor::new(
        config(&[("Router", "192.168.1.1"), ("NAS", "192.168.1.20")], true),
        prober.clone(),
        RecordingMailer::default(),
    );
    let token = ShutdownToken::new();

    for _ in 0..3 {
        monitor.run_cycle(&token);
    }

    assert_eq!(monitor.devices()[0].health(), DeviceHealth::Alerted);
    assert_eq!(monitor.devices()[1].health(), DeviceHealth::Ok);
    assert_eq!(monitor.mailer().subjects(), vec!["[ALERT] Router – no reply"]);
    assert_eq!(prober.calls().len(), 6);
}

#[test]
fn latency_at_threshold_is_not_a_failure() {
    let prober = ScriptedProber::default();
    prober.push("192.168.1.1", &[ok(200), ok(200), ok(200)]);
    let mut monitor = PingMonitor::new(
        config(&[("Router", "192.168.1.1")], true),
        prober,
        RecordingMailer::default(),
    );
    let token = ShutdownToken::new();

    for _ in 0..3 {
        monitor.run_cycle(&token);
    }

    assert_eq!(monitor.devices()[0].consecutive_failures(), 0);
    assert!(monitor.mailer().subjects().is_empty());
}

#[test]
fn cancelled_token_interrupts_cycle() {
    let prober = ScriptedProber::default();
    let mut monitor = PingMonitor::new(
        config(&[("Router", "192.168.1.1"), ("NAS", "192.168.1.20")], true),
        prober.clone(),
        RecordingMailer::default(),
    );
    let token = ShutdownToken::new();
    token.cancel();

    let report = monitor.run_cycle(&token);

    assert!(report.interrupted);
    assert_eq!(report.probed, 0);
    assert!(prober.calls().is_empty());
}

#[test]
fn run_returns_after_cancel() {
    let prober = ScriptedProber::default();
    let mut monitor = PingMonitor::new(
        config(&[("Router", "192.168.1.1")], true),
        prober.clone(),
        RecordingMailer::default(),
    );
    let token = ShutdownToken::new();
    let worker_token = token.clone();

    let handle = thread::spawn(move || monitor.run(&worker_token));
    thread::sleep(Duration::from_millis(50));
    token.cancel();

    handle.join().expect("monitor thread");
    assert!(!prober.calls().is_empty());
}
