//! Periodic connectivity monitoring
//!
//! [`Monitor`] owns the history log and drives the cycle state machine:
//! sample providers, evaluate the alert policy, record, publish, reschedule.
//! The periodic driver fires on a fixed start-to-start cadence; a cycle that
//! runs long may overlap the next one, which the history log tolerates.
//!
//! Alert policy, evaluated once per cycle with at most one outcome:
//! disconnection outranks slow speed, because a disconnected host has no
//! meaningful throughput reading. Throughput is awaited before the
//! observation is evaluated and published, so the slow-speed decision always
//! sees the value it alerts on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::alert::{AlertDispatcher, AlertEvent};
use crate::config::Config;
use crate::error::{NetPulseError, Result};
use crate::history::HistoryLog;
use crate::observation::{Observation, UNKNOWN};
use crate::presenter::Presenter;
use crate::providers::ProviderClient;

/// Default cycle cadence
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Default slow-speed threshold in Mbps
pub const DEFAULT_THRESHOLD_MBPS: f64 = 1000.0;

/// Monitoring loop options
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Start-to-start spacing between cycles
    pub interval: Duration,
    /// Download rate below which a slow-speed alert fires
    pub threshold_mbps: f64,
    /// UX pacing delay applied before a manual refresh runs
    pub refresh_pacing: Duration,
    /// Where the history snapshot attached to alerts is written
    pub snapshot_path: PathBuf,
    /// Recipient of disconnection alerts
    pub disconnect_recipient: String,
    /// Recipient of slow-speed alerts
    pub slow_speed_recipient: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            threshold_mbps: DEFAULT_THRESHOLD_MBPS,
            refresh_pacing: Duration::from_secs(2),
            snapshot_path: PathBuf::from("network_history.csv"),
            disconnect_recipient: "admin@example.com".to_string(),
            slow_speed_recipient: "netops@example.com".to_string(),
        }
    }
}

impl From<&Config> for MonitorConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.monitor.interval_secs),
            threshold_mbps: config.monitor.threshold_mbps,
            refresh_pacing: Duration::from_secs(config.monitor.refresh_pacing_secs),
            snapshot_path: config.monitor.snapshot_path.clone(),
            disconnect_recipient: config.alert.disconnect_recipient.clone(),
            slow_speed_recipient: config.alert.slow_speed_recipient.clone(),
        }
    }
}

/// The monitoring state machine
pub struct Monitor {
    config: MonitorConfig,
    providers: Arc<dyn ProviderClient>,
    history: Arc<HistoryLog>,
    dispatcher: AlertDispatcher,
    presenter: Arc<dyn Presenter>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        providers: Arc<dyn ProviderClient>,
        dispatcher: AlertDispatcher,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            config,
            providers,
            history: Arc::new(HistoryLog::new()),
            dispatcher,
            presenter,
        }
    }

    /// Read-only handle to the history log, for display and export
    pub fn history(&self) -> Arc<HistoryLog> {
        Arc::clone(&self.history)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// One full monitoring cycle. Blocking; safe to run from several tasks
    /// at once.
    pub fn run_cycle(&self) -> Observation {
        let public_ip = self.providers.fetch_public_ip();
        let connected = public_ip.is_some();
        log::debug!("cycle start, connected={}", connected);

        // interfaces are best-effort and independent of public connectivity
        let interfaces = self.providers.fetch_local_interfaces();
        let isp = match public_ip.as_deref() {
            Some(ip) => self.providers.fetch_isp(ip),
            None => UNKNOWN.to_string(),
        };
        let throughput = if connected {
            self.providers.fetch_throughput()
        } else {
            (None, None)
        };

        let observation = Observation::new(public_ip, isp, interfaces, throughput);
        self.evaluate_alerts(&observation);
        self.publish(observation.clone());
        observation
    }

    /// Start the periodic driver. The first cycle runs immediately; each
    /// subsequent tick fires `interval` after the previous one regardless of
    /// how long the cycle itself took.
    pub async fn run(self: Arc<Self>) {
        log::info!(
            "monitoring every {:?}, slow-speed threshold {:.0} Mbps",
            self.config.interval,
            self.config.threshold_mbps
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let monitor = Arc::clone(&self);
            tokio::task::spawn_blocking(move || {
                monitor.run_cycle();
            });
        }
    }

    /// On-demand refresh: the same sampling pipeline, run outside the
    /// periodic schedule, after a short pacing delay.
    pub async fn refresh(self: Arc<Self>) -> Result<Observation> {
        tokio::time::sleep(self.config.refresh_pacing).await;
        tokio::task::spawn_blocking(move || self.run_cycle())
            .await
            .map_err(|e| NetPulseError::Other(format!("refresh task failed: {}", e)))
    }

    /// On-demand throughput measurement. On success the result is recorded
    /// against the last known identity and published; `None` if the
    /// measurement failed.
    pub async fn run_speed_test(self: Arc<Self>) -> Option<(f64, f64)> {
        tokio::task::spawn_blocking(move || self.speed_test_cycle())
            .await
            .ok()
            .flatten()
    }

    fn speed_test_cycle(&self) -> Option<(f64, f64)> {
        log::info!("running on-demand speed test");
        let (down, up) = self.providers.fetch_throughput();
        let (Some(down), Some(up)) = (down, up) else {
            log::warn!("speed test failed");
            return None;
        };

        // the speed probe does not re-resolve identity; carry the last known
        let (public_ip, isp, interfaces) = match self.history.latest() {
            Some(last) => (last.public_ip, last.isp, last.local_interfaces),
            None => (None, UNKNOWN.to_string(), Vec::new()),
        };
        let observation = Observation::new(public_ip, isp, interfaces, (Some(down), Some(up)));
        self.publish(observation);
        Some((down, up))
    }

    /// Evaluate the alert policy against a finished observation. At most one
    /// alert fires; the snapshot excludes the observation that triggered it.
    fn evaluate_alerts(&self, observation: &Observation) {
        if !observation.connected {
            log::warn!("internet disconnected");
            let event =
                AlertEvent::disconnection(&self.config.disconnect_recipient, self.write_snapshot());
            self.dispatcher.send(&event);
        } else if let Some(download) = observation.download_mbps {
            if download < self.config.threshold_mbps {
                log::warn!(
                    "download rate {:.2} Mbps below threshold {:.2} Mbps",
                    download,
                    self.config.threshold_mbps
                );
                let event = AlertEvent::slow_speed(
                    &self.config.slow_speed_recipient,
                    download,
                    self.write_snapshot(),
                );
                self.dispatcher.send(&event);
            }
        }
    }

    /// Write the alert attachment; a failed snapshot downgrades the alert to
    /// one without an attachment rather than suppressing it.
    fn write_snapshot(&self) -> Option<PathBuf> {
        match self.history.snapshot_csv(&self.config.snapshot_path) {
            Ok(()) => Some(self.config.snapshot_path.clone()),
            Err(e) => {
                log::warn!("history snapshot failed: {}", e);
                None
            }
        }
    }

    fn publish(&self, observation: Observation) {
        self.history.append(observation.clone());
        self.presenter.on_observation_updated(&observation);
        self.presenter.on_history_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertTransport;
    use crate::error::Result as NetResult;
    use lettre::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockProviders {
        public_ip: Option<String>,
        isp: String,
        throughput: (Option<f64>, Option<f64>),
        throughput_calls: AtomicUsize,
    }

    impl MockProviders {
        fn connected(throughput: (Option<f64>, Option<f64>)) -> Self {
            Self {
                public_ip: Some("203.0.113.9".to_string()),
                isp: "ACME Corp".to_string(),
                throughput,
                throughput_calls: AtomicUsize::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                public_ip: None,
                isp: "unused".to_string(),
                throughput: (Some(999.0), Some(999.0)),
                throughput_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ProviderClient for MockProviders {
        fn fetch_public_ip(&self) -> Option<String> {
            self.public_ip.clone()
        }
        fn fetch_isp(&self, _ip: &str) -> String {
            self.isp.clone()
        }
        fn fetch_local_interfaces(&self) -> Vec<(String, String)> {
            vec![("eth0".to_string(), "10.0.0.5".to_string())]
        }
        fn fetch_throughput(&self) -> (Option<f64>, Option<f64>) {
            self.throughput_calls.fetch_add(1, Ordering::SeqCst);
            self.throughput
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<String>>,
    }

    impl AlertTransport for RecordingTransport {
        fn deliver(&self, message: &Message) -> NetResult<()> {
            self.delivered
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&message.formatted()).into_owned());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPresenter {
        observations: AtomicUsize,
        history_changes: AtomicUsize,
    }

    impl Presenter for CountingPresenter {
        fn on_observation_updated(&self, _observation: &Observation) {
            self.observations.fetch_add(1, Ordering::SeqCst);
        }
        fn on_ping_result(&self, _line: &str) {}
        fn on_history_changed(&self) {
            self.history_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        monitor: Arc<Monitor>,
        providers: Arc<MockProviders>,
        transport: Arc<RecordingTransport>,
        presenter: Arc<CountingPresenter>,
        _dir: tempfile::TempDir,
    }

    fn harness(providers: MockProviders) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let providers = Arc::new(providers);
        let transport = Arc::new(RecordingTransport::default());
        let presenter = Arc::new(CountingPresenter::default());

        struct SharedTransport(Arc<RecordingTransport>);
        impl AlertTransport for SharedTransport {
            fn deliver(&self, message: &Message) -> NetResult<()> {
                self.0.deliver(message)
            }
        }

        let config = MonitorConfig {
            interval: Duration::from_secs(600),
            threshold_mbps: 1000.0,
            refresh_pacing: Duration::from_millis(1),
            snapshot_path: dir.path().join("network_history.csv"),
            disconnect_recipient: "admin@example.com".to_string(),
            slow_speed_recipient: "netops@example.com".to_string(),
        };
        let dispatcher = AlertDispatcher::new(
            "monitor@example.com".to_string(),
            Box::new(SharedTransport(Arc::clone(&transport))),
        );
        let monitor = Arc::new(Monitor::new(
            config,
            Arc::clone(&providers) as Arc<dyn ProviderClient>,
            dispatcher,
            Arc::clone(&presenter) as Arc<dyn Presenter>,
        ));
        Harness { monitor, providers, transport, presenter, _dir: dir }
    }

    #[test]
    fn test_disconnected_cycle_fires_one_disconnection_alert() {
        let h = harness(MockProviders::offline());
        let observation = h.monitor.run_cycle();

        assert!(!observation.connected);
        assert_eq!(observation.isp, UNKNOWN);
        assert!(observation.download_mbps.is_none());
        // interfaces are still collected while offline
        assert_eq!(observation.local_interfaces.len(), 1);

        let delivered = h.transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Internet Disconnection Alert"));
        assert!(delivered[0].contains("admin@example.com"));
        // the history snapshot rides along as an attachment
        assert!(delivered[0].contains("network_history.csv"));
        assert!(!delivered[0].contains("Slow Internet Alert"));
    }

    #[test]
    fn test_disconnected_cycle_skips_throughput() {
        let h = harness(MockProviders::offline());
        h.monitor.run_cycle();
        assert_eq!(h.providers.throughput_calls.load(Ordering::SeqCst), 0);
        let latest = h.monitor.history().latest().unwrap();
        assert!(latest.download_mbps.is_none() && latest.upload_mbps.is_none());
    }

    #[test]
    fn test_slow_speed_fires_one_alert_to_second_recipient() {
        let h = harness(MockProviders::connected((Some(500.0), Some(500.0))));
        let observation = h.monitor.run_cycle();

        assert!(observation.connected);
        let delivered = h.transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Slow Internet Alert"));
        assert!(delivered[0].contains("netops@example.com"));
        assert!(!delivered[0].contains("Internet Disconnection Alert"));
    }

    #[test]
    fn test_fast_link_fires_no_alert() {
        let h = harness(MockProviders::connected((Some(2000.0), Some(800.0))));
        h.monitor.run_cycle();
        assert!(h.transport.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unmeasured_throughput_fires_no_alert() {
        let h = harness(MockProviders::connected((None, None)));
        h.monitor.run_cycle();
        assert!(h.transport.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cycle_appends_and_publishes() {
        let h = harness(MockProviders::connected((Some(2000.0), Some(800.0))));
        h.monitor.run_cycle();
        h.monitor.run_cycle();

        assert_eq!(h.monitor.history().len(), 2);
        assert_eq!(h.presenter.observations.load(Ordering::SeqCst), 2);
        assert_eq!(h.presenter.history_changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_excludes_triggering_observation() {
        let h = harness(MockProviders::offline());
        // first cycle: snapshot written before the first append is empty of rows
        h.monitor.run_cycle();
        let snapshot_path = h.monitor.config().snapshot_path.clone();
        let first = std::fs::read_to_string(&snapshot_path).unwrap();
        assert_eq!(first.lines().count(), 1); // header only

        // second cycle: snapshot carries exactly the first observation
        h.monitor.run_cycle();
        let second = std::fs::read_to_string(&snapshot_path).unwrap();
        assert_eq!(second.lines().count(), 2);
    }

    #[test]
    fn test_observation_invariant_holds() {
        for providers in [
            MockProviders::offline(),
            MockProviders::connected((Some(100.0), Some(50.0))),
        ] {
            let h = harness(providers);
            let observation = h.monitor.run_cycle();
            assert_eq!(observation.connected, observation.public_ip.is_some());
        }
    }

    #[test]
    fn test_concurrent_cycles_lose_no_history() {
        let h = harness(MockProviders::connected((Some(2000.0), Some(800.0))));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let monitor = Arc::clone(&h.monitor);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    monitor.run_cycle();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(h.monitor.history().len(), 40);
    }

    #[tokio::test]
    async fn test_refresh_runs_full_pipeline() {
        let h = harness(MockProviders::connected((Some(2000.0), Some(800.0))));
        let observation = Arc::clone(&h.monitor).refresh().await.unwrap();
        assert!(observation.connected);
        assert_eq!(h.monitor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_speed_test_records_against_last_identity() {
        let h = harness(MockProviders::connected((Some(120.5), Some(40.25))));
        // seed history with a cycle so the probe has an identity to carry
        h.monitor.run_cycle();

        let measured = Arc::clone(&h.monitor).run_speed_test().await;
        assert_eq!(measured, Some((120.5, 40.25)));

        let latest = h.monitor.history().latest().unwrap();
        assert_eq!(latest.public_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(latest.isp, "ACME Corp");
        assert_eq!(latest.download_mbps, Some(120.5));
        assert_eq!(h.monitor.history().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_speed_test_publishes_nothing() {
        let h = harness(MockProviders::connected((None, None)));
        assert!(Arc::clone(&h.monitor).run_speed_test().await.is_none());
        assert!(h.monitor.history().is_empty());
    }
}
