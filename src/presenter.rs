//! Presentation boundary
//!
//! The monitor pushes state changes through this trait and never learns what
//! the other side does with them. Views render; they do not participate in
//! scheduling or alert policy.

use crate::observation::{Observation, UNKNOWN};

/// Callback surface implemented by the view layer
pub trait Presenter: Send + Sync {
    /// A fresh observation was produced (periodic cycle, manual refresh, or
    /// a completed speed test)
    fn on_observation_updated(&self, observation: &Observation);

    /// One ping round-trip completed; `line` is the human-readable result
    fn on_ping_result(&self, line: &str);

    /// The history log gained an entry
    fn on_history_changed(&self);
}

/// Console presenter: renders each observation as a property/value table
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn on_observation_updated(&self, observation: &Observation) {
        let speed = match (observation.download_mbps, observation.upload_mbps) {
            (Some(down), Some(up)) => {
                format!("{:.2} Mbps (Download), {:.2} Mbps (Upload)", down, up)
            }
            _ => UNKNOWN.to_string(),
        };
        let rows = [
            ("IP Address", observation.public_ip.clone().unwrap_or_else(|| UNKNOWN.to_string())),
            ("ISP", observation.isp.clone()),
            (
                "Status",
                if observation.connected { "Connected" } else { "Disconnected" }.to_string(),
            ),
            ("Network Info", observation.interfaces_display()),
            ("Speed", speed),
        ];

        println!("{:<14}{}", "Property", "Value");
        println!("{:<14}{}", "--------", "-----");
        for (property, value) in rows {
            println!("{:<14}{}", property, value);
        }
        println!("[{}]", observation.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }

    fn on_ping_result(&self, line: &str) {
        println!("{}", line);
    }

    fn on_history_changed(&self) {}
}
