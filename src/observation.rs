//! Connectivity observations
//!
//! An [`Observation`] is one timestamped snapshot of network state: the public
//! IP (if any), the ISP behind it, the host's local IPv4 interfaces, and the
//! measured link throughput. Observations are constructed once per monitoring
//! cycle and never mutated afterwards.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Sentinel used wherever the ISP (or another optional field) is unknown
pub const UNKNOWN: &str = "N/A";

/// One snapshot of connectivity state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Capture time
    pub timestamp: DateTime<Local>,
    /// Public IP address, if reachable
    pub public_ip: Option<String>,
    /// ISP / organization name, `"N/A"` when unknown
    pub isp: String,
    /// (interface name, IPv4 address) pairs in host enumeration order
    pub local_interfaces: Vec<(String, String)>,
    /// Measured download rate in Mbps; `None` if the test was skipped or failed
    pub download_mbps: Option<f64>,
    /// Measured upload rate in Mbps; always paired with `download_mbps`
    pub upload_mbps: Option<f64>,
    /// Whether the host had internet connectivity at capture time
    pub connected: bool,
}

impl Observation {
    /// Build an observation from raw provider results.
    ///
    /// `connected` is derived from the public IP, and a half-measured
    /// throughput pair collapses to `(None, None)` so the two rates are
    /// always both present or both absent.
    pub fn new(
        public_ip: Option<String>,
        isp: String,
        local_interfaces: Vec<(String, String)>,
        throughput: (Option<f64>, Option<f64>),
    ) -> Self {
        let connected = public_ip.is_some();
        let (download_mbps, upload_mbps) = match throughput {
            (Some(down), Some(up)) => (Some(down.max(0.0)), Some(up.max(0.0))),
            _ => (None, None),
        };

        Self {
            timestamp: Local::now(),
            public_ip,
            isp,
            local_interfaces,
            download_mbps,
            upload_mbps,
            connected,
        }
    }

    /// Observation for a host with no internet connectivity
    pub fn disconnected(local_interfaces: Vec<(String, String)>) -> Self {
        Self::new(None, UNKNOWN.to_string(), local_interfaces, (None, None))
    }

    /// Whether a throughput measurement is attached
    pub fn has_throughput(&self) -> bool {
        self.download_mbps.is_some()
    }

    /// Interface list as a single display string, e.g. `"eth0 10.0.0.5, lo 127.0.0.1"`
    pub fn interfaces_display(&self) -> String {
        if self.local_interfaces.is_empty() {
            return UNKNOWN.to_string();
        }
        self.local_interfaces
            .iter()
            .map(|(name, addr)| format!("{} {}", name, addr))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
