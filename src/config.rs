//! Configuration management
//!
//! This module provides configuration persistence for monitoring cadence,
//! alert thresholds and recipients, and provider endpoints. SMTP credentials
//! are never stored in the file; the config names the environment variables
//! they are read from.

use crate::error::{NetPulseError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// netpulse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Monitoring loop options
    pub monitor: MonitorSection,
    /// Alert delivery options
    pub alert: AlertSection,
    /// Provider endpoint options
    pub providers: ProviderSection,
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Cycle cadence in seconds (start-to-start)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Download rate below which a slow-speed alert fires (Mbps)
    #[serde(default = "default_threshold_mbps")]
    pub threshold_mbps: f64,
    /// Pacing delay applied to manual refreshes, in seconds
    #[serde(default = "default_refresh_pacing_secs")]
    pub refresh_pacing_secs: u64,
    /// Where the history snapshot attached to alerts is written
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

/// Alert delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSection {
    /// SMTP relay host
    #[serde(default = "default_smtp_relay")]
    pub smtp_relay: String,
    /// Submission port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// From address on alert mail
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Environment variable holding the SMTP username
    #[serde(default = "default_username_env")]
    pub username_env: String,
    /// Environment variable holding the SMTP password
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Recipient of disconnection alerts
    #[serde(default = "default_disconnect_recipient")]
    pub disconnect_recipient: String,
    /// Recipient of slow-speed alerts
    #[serde(default = "default_slow_speed_recipient")]
    pub slow_speed_recipient: String,
}

/// Provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Public IP echo service
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,
    /// ISP lookup services in fallback order; `{ip}` placeholder per entry
    #[serde(default = "default_isp_endpoints")]
    pub isp_endpoints: Vec<String>,
    /// Speed test server candidates (best server picked by connect latency)
    #[serde(default = "default_speed_servers")]
    pub speed_servers: Vec<String>,
    /// Per-lookup timeout in seconds
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

// Default value functions
fn default_interval_secs() -> u64 {
    600 // 10 minutes
}

fn default_threshold_mbps() -> f64 {
    1000.0
}

fn default_refresh_pacing_secs() -> u64 {
    2
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("network_history.csv")
}

fn default_smtp_relay() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_sender() -> String {
    "netpulse@example.com".to_string()
}

fn default_username_env() -> String {
    "NETPULSE_SMTP_USER".to_string()
}

fn default_password_env() -> String {
    "NETPULSE_SMTP_PASS".to_string()
}

fn default_disconnect_recipient() -> String {
    "admin@example.com".to_string()
}

fn default_slow_speed_recipient() -> String {
    "netops@example.com".to_string()
}

fn default_ip_echo_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_isp_endpoints() -> Vec<String> {
    vec![
        "https://ipinfo.io/{ip}/json".to_string(),
        "https://ipapi.co/{ip}/json".to_string(),
        "http://ip-api.com/json/{ip}".to_string(),
    ]
}

fn default_speed_servers() -> Vec<String> {
    vec!["https://speed.cloudflare.com".to_string()]
}

fn default_lookup_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorSection::default(),
            alert: AlertSection::default(),
            providers: ProviderSection::default(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            threshold_mbps: default_threshold_mbps(),
            refresh_pacing_secs: default_refresh_pacing_secs(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            smtp_relay: default_smtp_relay(),
            smtp_port: default_smtp_port(),
            sender: default_sender(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            disconnect_recipient: default_disconnect_recipient(),
            slow_speed_recipient: default_slow_speed_recipient(),
        }
    }
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            ip_echo_url: default_ip_echo_url(),
            isp_endpoints: default_isp_endpoints(),
            speed_servers: default_speed_servers(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl AlertSection {
    /// Read SMTP credentials from the configured environment variables
    pub fn credentials(&self) -> Result<(String, String)> {
        let username = std::env::var(&self.username_env).map_err(|_| {
            NetPulseError::Config(format!("{} is not set", self.username_env))
        })?;
        let password = std::env::var(&self.password_env).map_err(|_| {
            NetPulseError::Config(format!("{} is not set", self.password_env))
        })?;
        Ok((username, password))
    }
}

impl Config {
    /// Get the default configuration file path
    ///
    /// Returns `~/.config/netpulse` on Unix-like systems, or
    /// `%APPDATA%\netpulse` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(windows) {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from(".config"))
        };

        Ok(config_dir.join("netpulse"))
    }

    /// Load configuration from the default path, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_dir = Self::default_path()?;
        let config_file = config_dir.join("config.toml");

        if !config_file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| NetPulseError::Parse(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::default_path()?;
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| NetPulseError::Other(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.monitor.interval_secs, 600);
        assert_eq!(config.monitor.threshold_mbps, 1000.0);
        assert_eq!(config.alert.smtp_port, 587);
        assert_eq!(config.providers.isp_endpoints.len(), 3);
        assert!(config.providers.isp_endpoints[0].contains("{ip}"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.monitor.interval_secs, deserialized.monitor.interval_secs);
        assert_eq!(config.alert.disconnect_recipient, deserialized.alert.disconnect_recipient);
        assert_eq!(config.providers.speed_servers, deserialized.providers.speed_servers);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            "[monitor]\ninterval_secs = 60\n\n[alert]\n\n[providers]\n",
        )
        .unwrap();
        assert_eq!(config.monitor.interval_secs, 60);
        assert_eq!(config.monitor.threshold_mbps, 1000.0);
        assert_eq!(config.alert.smtp_relay, "smtp.gmail.com");
    }

    #[test]
    fn test_credentials_require_env() {
        let mut alert = AlertSection::default();
        alert.username_env = "NETPULSE_TEST_USER_UNSET".to_string();
        alert.password_env = "NETPULSE_TEST_PASS_UNSET".to_string();
        assert!(alert.credentials().is_err());
    }
}
