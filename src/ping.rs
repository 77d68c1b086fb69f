//! Continuous ping sessions
//!
//! A [`PingSession`] drives the host operating system's `ping` utility, one
//! ICMP echo round-trip per tick on a fixed cadence, and publishes each
//! textual result to the presenter. The session runs until explicitly
//! stopped; the stop flag is checked between iterations and any in-flight
//! subprocess is killed when its handle drops.
//!
//! Ping sessions share no state with the monitoring loop and never alert.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::presenter::Presenter;

/// Cadence between echo round-trips
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Bound on a single subprocess invocation
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// One ICMP echo round-trip via the system ping command.
///
/// Uses the system binary to avoid requiring raw socket privileges. Success
/// is read from the exit status; the returned text is the process output (or
/// the failure description) and is only ever displayed, never parsed for
/// policy.
pub async fn ping_once(target: &str, timeout: Duration) -> String {
    #[cfg(target_os = "windows")]
    let count_flag = "-n";
    #[cfg(not(target_os = "windows"))]
    let count_flag = "-c";

    let mut command = Command::new("ping");
    command.args([count_flag, "1", target]).kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => format!("Ping failed: no reply from {} within {:?}", target, timeout),
        Ok(Err(e)) => format!("Ping failed: {}", e),
        Ok(Ok(output)) => {
            if output.status.success() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    String::from_utf8_lossy(&output.stdout).trim().to_string()
                } else {
                    stderr
                };
                format!("Ping failed: {}", detail)
            }
        }
    }
}

/// A cancellable background task pinging one target
pub struct PingSession {
    target: String,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PingSession {
    /// Start pinging `target` once per second
    pub fn spawn(target: String, presenter: Arc<dyn Presenter>) -> Self {
        Self::spawn_with_interval(target, presenter, PING_INTERVAL)
    }

    /// Start pinging with a custom cadence
    pub fn spawn_with_interval(
        target: String,
        presenter: Arc<dyn Presenter>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let host = target.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                let line = ping_once(&host, PING_TIMEOUT).await;
                // nothing is published once stop has been signalled
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                presenter.on_ping_result(&line);
            }
            log::debug!("ping session for {} finished", host);
        });

        Self { target, stop, handle }
    }

    /// Target host of this session
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Signal the session to stop; checked between iterations
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Whether stop has been signalled
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Stop the session and wait for teardown, killing any in-flight echo
    pub async fn shutdown(mut self) {
        self.stop();
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for PingSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // aborting drops the child future; kill_on_drop reaps the subprocess
        self.handle.abort();
    }
}
