//! # netpulse
//!
//! A connectivity monitor. netpulse periodically samples network state
//! (public IP, ISP, local interface addresses, and link throughput), keeps an
//! append-only history with CSV export, and raises email alerts when the
//! connection drops or the download rate falls below a configured threshold.
//!
//! ## Features
//!
//! - **Periodic Monitoring**: fixed-cadence background sampling (10 minutes
//!   by default) with on-demand refresh that leaves the schedule untouched
//! - **Provider Fallback**: ISP lookup across three independent services,
//!   first non-empty answer wins, every failure degraded to a sentinel
//! - **Throughput Measurement**: best-server selection by connect latency,
//!   then timed download and upload transfers
//! - **Email Alerts**: disconnection and slow-speed notifications over
//!   authenticated STARTTLS submission, history snapshot attached
//! - **Continuous Ping**: cancellable 1 Hz echo sessions via the host ping
//!   utility
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use netpulse::{
//!     AlertDispatcher, ConsolePresenter, HttpProviderClient, Monitor, MonitorConfig, SmtpMailer,
//! };
//!
//! # fn main() -> netpulse::Result<()> {
//! let providers = Arc::new(HttpProviderClient::new()?);
//! let mailer = SmtpMailer::new(
//!     "smtp.example.com".to_string(),
//!     587,
//!     "monitor@example.com".to_string(),
//!     std::env::var("SMTP_PASS").unwrap_or_default(),
//! );
//! let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(mailer));
//!
//! let monitor = Arc::new(Monitor::new(
//!     MonitorConfig::default(),
//!     providers,
//!     dispatcher,
//!     Arc::new(ConsolePresenter),
//! ));
//!
//! let observation = monitor.run_cycle();
//! println!("connected: {}", observation.connected);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Command-line interface binary

pub mod alert; // Email alert composition and SMTP dispatch
pub mod config; // Configuration management with TOML persistence
pub mod error;
pub mod history; // Append-only observation log with CSV export
pub mod monitor; // Periodic monitoring loop and alert policy
pub mod observation;
pub mod ping; // Cancellable continuous ping sessions
pub mod presenter; // Presentation boundary consumed by the view layer
pub mod providers; // External lookups: public IP, ISP, interfaces, throughput

// Re-export main types
pub use alert::{AlertDispatcher, AlertEvent, AlertKind, AlertTransport, SmtpMailer};
pub use config::{AlertSection, Config, MonitorSection, ProviderSection};
pub use error::{NetPulseError, Result};
pub use history::{export_current_csv, HistoryLog, CSV_HEADER};
pub use monitor::{Monitor, MonitorConfig, DEFAULT_INTERVAL, DEFAULT_THRESHOLD_MBPS};
pub use observation::{Observation, UNKNOWN};
pub use ping::{ping_once, PingSession, PING_INTERVAL, PING_TIMEOUT};
pub use presenter::{ConsolePresenter, Presenter};
pub use providers::{HttpProviderClient, ProviderClient, LOOKUP_TIMEOUT};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
