//! Provider lookups for public IP, ISP, local interfaces, and throughput
//!
//! Every function here degrades gracefully: a failed lookup becomes `None`,
//! an empty list, or the `"N/A"` sentinel, never an error surfaced to the
//! monitoring cycle. The monitor is the only place that interprets absence
//! as "disconnected" or "unknown".
//!
//! All HTTP calls carry a bounded timeout so a stalled provider cannot wedge
//! the monitoring cadence. Throughput measurement is long-running (seconds to
//! tens of seconds) and blocking; callers run it on a blocking task, never on
//! the event-processing context.

use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::error::{NetPulseError, Result};
use crate::observation::UNKNOWN;

/// Per-call timeout for IP and ISP lookups
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall timeout for a single throughput transfer
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect timeout used when probing speed test servers
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Cap on how long a single direction is measured
const MEASURE_WINDOW: Duration = Duration::from_secs(10);

/// Bytes requested from the download endpoint
const DOWNLOAD_BYTES: u64 = 25_000_000;

/// Bytes posted to the upload endpoint
const UPLOAD_BYTES: usize = 10_000_000;

const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

/// ISP lookup services, tried in order; `{ip}` is replaced with the address
const DEFAULT_ISP_ENDPOINTS: [&str; 3] = [
    "https://ipinfo.io/{ip}/json",
    "https://ipapi.co/{ip}/json",
    "http://ip-api.com/json/{ip}",
];

const DEFAULT_SPEED_SERVERS: [&str; 1] = ["https://speed.cloudflare.com"];

/// External data sources consumed by the monitoring cycle
pub trait ProviderClient: Send + Sync {
    /// Public IP from a single echo service; `None` on any failure, no retry
    fn fetch_public_ip(&self) -> Option<String>;

    /// ISP/organization for `ip`, first non-empty answer across the ordered
    /// provider list; `"N/A"` when the input is empty or every provider fails
    fn fetch_isp(&self, ip: &str) -> String;

    /// All host (interface, IPv4 address) pairs in enumeration order.
    /// Ordering is display-only and not stable across platforms.
    fn fetch_local_interfaces(&self) -> Vec<(String, String)>;

    /// (download, upload) in Mbps after best-server selection;
    /// `(None, None)` on any failure. Blocking and long-running.
    fn fetch_throughput(&self) -> (Option<f64>, Option<f64>);
}

/// Production [`ProviderClient`] backed by HTTP services and host tooling
pub struct HttpProviderClient {
    lookup: reqwest::blocking::Client,
    transfer: reqwest::blocking::Client,
    ip_echo_url: String,
    isp_endpoints: Vec<String>,
    speed_servers: Vec<String>,
}

impl HttpProviderClient {
    /// Create a client with the default endpoints and timeouts
    pub fn new() -> Result<Self> {
        Self::with_timeout(LOOKUP_TIMEOUT)
    }

    /// Create a client with a custom per-lookup timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let lookup = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetPulseError::Network(format!("failed to create HTTP client: {}", e)))?;
        let transfer = reqwest::blocking::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .map_err(|e| NetPulseError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            lookup,
            transfer,
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
            isp_endpoints: DEFAULT_ISP_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            speed_servers: DEFAULT_SPEED_SERVERS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Override the public IP echo service
    pub fn with_ip_echo_url(mut self, url: String) -> Self {
        self.ip_echo_url = url;
        self
    }

    /// Override the ordered ISP lookup list (`{ip}` placeholder per entry)
    pub fn with_isp_endpoints(mut self, endpoints: Vec<String>) -> Self {
        if !endpoints.is_empty() {
            self.isp_endpoints = endpoints;
        }
        self
    }

    /// Override the speed test server candidates
    pub fn with_speed_servers(mut self, servers: Vec<String>) -> Self {
        if !servers.is_empty() {
            self.speed_servers = servers;
        }
        self
    }

    fn lookup_org(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .lookup
            .get(url)
            .send()
            .map_err(|e| NetPulseError::Network(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(NetPulseError::Network(format!(
                "lookup returned {}",
                response.status()
            )));
        }

        // schemas vary slightly across the lookup services; all of them
        // carry the organization under "org"
        let json: serde_json::Value = response
            .json()
            .map_err(|e| NetPulseError::Parse(format!("malformed lookup body: {}", e)))?;
        Ok(json
            .get("org")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Pick the candidate with the lowest TCP connect latency
    fn best_server(&self) -> Option<String> {
        let mut best: Option<(Duration, &String)> = None;
        for server in &self.speed_servers {
            let Some(addr) = server_addr(server) else {
                log::debug!("cannot resolve speed server {}", server);
                continue;
            };
            let start = Instant::now();
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(_) => {
                    let latency = start.elapsed();
                    log::debug!("{} reachable in {:?}", server, latency);
                    if best.as_ref().map_or(true, |(b, _)| latency < *b) {
                        best = Some((latency, server));
                    }
                }
                Err(e) => log::debug!("{} unreachable: {}", server, e),
            }
        }
        best.map(|(_, server)| server.clone())
    }

    fn measure_download(&self, base: &str) -> Result<f64> {
        let url = format!("{}/__down?bytes={}", base.trim_end_matches('/'), DOWNLOAD_BYTES);
        let start = Instant::now();
        let mut response = self
            .transfer
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| NetPulseError::Network(format!("download request failed: {}", e)))?;

        let mut buffer = vec![0u8; 64 * 1024];
        let mut total: u64 = 0;
        while start.elapsed() < MEASURE_WINDOW {
            match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => total += n as u64,
                Err(e) => return Err(NetPulseError::Network(format!("download stalled: {}", e))),
            }
        }
        rate_mbps(total, start.elapsed())
    }

    fn measure_upload(&self, base: &str) -> Result<f64> {
        let url = format!("{}/__up", base.trim_end_matches('/'));
        let payload = vec![0u8; UPLOAD_BYTES];
        let start = Instant::now();
        self.transfer
            .post(&url)
            .body(payload)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| NetPulseError::Network(format!("upload request failed: {}", e)))?;
        rate_mbps(UPLOAD_BYTES as u64, start.elapsed())
    }
}

impl ProviderClient for HttpProviderClient {
    fn fetch_public_ip(&self) -> Option<String> {
        let result = self
            .lookup
            .get(&self.ip_echo_url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text());
        match result {
            Ok(body) => {
                let ip = body.trim().to_string();
                if ip.is_empty() {
                    log::debug!("public IP echo returned an empty body");
                    None
                } else {
                    log::debug!("public IP: {}", ip);
                    Some(ip)
                }
            }
            Err(e) => {
                log::debug!("public IP lookup failed: {}", e);
                None
            }
        }
    }

    fn fetch_isp(&self, ip: &str) -> String {
        select_isp(ip, &self.isp_endpoints, |url| self.lookup_org(url))
    }

    fn fetch_local_interfaces(&self) -> Vec<(String, String)> {
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(output) = Command::new("ip").args(["-o", "-4", "addr", "show"]).output() {
                if output.status.success() {
                    return parse_ip_addr_output(&String::from_utf8_lossy(&output.stdout));
                }
            }
            match Command::new("ifconfig").arg("-a").output() {
                Ok(output) => parse_ifconfig_output(&String::from_utf8_lossy(&output.stdout)),
                Err(e) => {
                    log::warn!("interface enumeration failed: {}", e);
                    Vec::new()
                }
            }
        }

        #[cfg(target_os = "windows")]
        {
            match Command::new("ipconfig").output() {
                Ok(output) => parse_ipconfig_output(&String::from_utf8_lossy(&output.stdout)),
                Err(e) => {
                    log::warn!("interface enumeration failed: {}", e);
                    Vec::new()
                }
            }
        }
    }

    fn fetch_throughput(&self) -> (Option<f64>, Option<f64>) {
        let Some(server) = self.best_server() else {
            log::warn!("no reachable speed test server");
            return (None, None);
        };
        log::info!("measuring throughput against {}", server);

        let measured = self
            .measure_download(&server)
            .and_then(|down| self.measure_upload(&server).map(|up| (down, up)));
        match measured {
            Ok((down, up)) => {
                log::info!("throughput: {:.2} Mbps down, {:.2} Mbps up", down, up);
                (Some(down), Some(up))
            }
            Err(e) => {
                log::warn!("throughput measurement failed: {}", e);
                (None, None)
            }
        }
    }
}

/// Ordered fallback across ISP lookup services: the first non-empty
/// organization wins, every per-provider failure is swallowed.
fn select_isp<F>(ip: &str, endpoints: &[String], lookup: F) -> String
where
    F: Fn(&str) -> Result<Option<String>>,
{
    if ip.trim().is_empty() {
        return UNKNOWN.to_string();
    }
    for template in endpoints {
        let url = template.replace("{ip}", ip);
        match lookup(&url) {
            Ok(Some(org)) if !org.trim().is_empty() => {
                log::debug!("ISP lookup succeeded via {}", url);
                return org;
            }
            Ok(_) => log::debug!("{} returned no organization, trying next provider", url),
            Err(e) => log::debug!("{} failed ({}), trying next provider", url, e),
        }
    }
    UNKNOWN.to_string()
}

fn server_addr(base: &str) -> Option<SocketAddr> {
    let url = reqwest::Url::parse(base).ok()?;
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    format!("{}:{}", host, port).to_socket_addrs().ok()?.next()
}

fn rate_mbps(bytes: u64, elapsed: Duration) -> Result<f64> {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return Err(NetPulseError::Network("no data transferred".to_string()));
    }
    Ok((bytes * 8) as f64 / secs / 1_000_000.0)
}

/// Parse `ip -o -4 addr show` output
///
/// Format: `2: eth0    inet 192.168.1.5/24 brd 192.168.1.255 scope global eth0`
fn parse_ip_addr_output(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 && parts[2] == "inet" {
            let name = parts[1].trim_end_matches(':').to_string();
            let addr = parts[3].split('/').next().unwrap_or("").to_string();
            if !addr.is_empty() {
                pairs.push((name, addr));
            }
        }
    }
    pairs
}

/// Parse `ifconfig -a` output (BSD and Linux variants)
fn parse_ifconfig_output(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    for line in output.lines() {
        if !line.starts_with(' ') && !line.starts_with('\t') && line.contains(':') {
            if let Some(name) = line.split(&[':', ' '][..]).next() {
                if !name.is_empty() {
                    current = name.to_string();
                }
            }
        } else if let Some(rest) = line.trim_start().strip_prefix("inet ") {
            if let Some(addr) = rest.split_whitespace().next() {
                // older ifconfig prints "inet addr:10.0.0.5"
                let addr = addr.strip_prefix("addr:").unwrap_or(addr);
                if !current.is_empty() && addr.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    pairs.push((current.clone(), addr.to_string()));
                }
            }
        }
    }
    pairs
}

/// Parse `ipconfig` output (Windows)
#[allow(dead_code)]
fn parse_ipconfig_output(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if !line.starts_with(' ') && trimmed.ends_with(':') {
            if let Some(idx) = trimmed.to_lowercase().find("adapter ") {
                current = trimmed[idx + 8..].trim_end_matches(':').trim().to_string();
            }
        } else if trimmed.starts_with("IPv4 Address") {
            if let Some(addr) = trimmed.split(':').nth(1) {
                let addr = addr.trim().trim_end_matches("(Preferred)").trim();
                if !current.is_empty() && !addr.is_empty() {
                    pairs.push((current.clone(), addr.to_string()));
                }
            }
        }
    }
    pairs
}
