//! Email alert dispatch
//!
//! Alerts are fire-and-forget: composition, authentication, or transmission
//! failures are logged and swallowed so a broken mail path can never stall or
//! crash the monitoring cycle. Delivery is at-most-once with no retry.
//!
//! The SMTP connection is scoped to a single send: the transport is built,
//! used, and dropped inside [`AlertDispatcher::send`], releasing it on every
//! exit path.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::{NetPulseError, Result};

/// Standard mail submission port (STARTTLS)
pub const SUBMISSION_PORT: u16 = 587;

/// What triggered an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Public IP lookup failed: the host has no internet connectivity
    Disconnection,
    /// Measured download rate fell below the configured threshold
    SlowSpeed,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Disconnection => write!(f, "disconnection"),
            AlertKind::SlowSpeed => write!(f, "slow speed"),
        }
    }
}

/// One outbound notification, produced and consumed within a single cycle
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub subject: String,
    pub body: String,
    pub recipient: String,
    /// History snapshot attached to the mail, if one could be written
    pub attachment: Option<PathBuf>,
}

impl AlertEvent {
    /// Alert for a lost internet connection
    pub fn disconnection(recipient: &str, attachment: Option<PathBuf>) -> Self {
        Self {
            kind: AlertKind::Disconnection,
            subject: "Internet Disconnection Alert".to_string(),
            body: format!(
                "Internet disconnected at {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            recipient: recipient.to_string(),
            attachment,
        }
    }

    /// Alert for a sub-threshold download rate
    pub fn slow_speed(recipient: &str, download_mbps: f64, attachment: Option<PathBuf>) -> Self {
        Self {
            kind: AlertKind::SlowSpeed,
            subject: "Slow Internet Alert".to_string(),
            body: format!(
                "Internet speed is slow: {:.2} Mbps at {}",
                download_mbps,
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            recipient: recipient.to_string(),
            attachment,
        }
    }
}

/// Delivery seam so the dispatcher can be exercised without a mail relay
pub trait AlertTransport: Send + Sync {
    fn deliver(&self, message: &Message) -> Result<()>;
}

/// STARTTLS SMTP submission to a remote relay
pub struct SmtpMailer {
    relay: String,
    port: u16,
    credentials: Credentials,
}

impl SmtpMailer {
    pub fn new(relay: String, port: u16, username: String, password: String) -> Self {
        Self {
            relay,
            port,
            credentials: Credentials::new(username, password),
        }
    }
}

impl AlertTransport for SmtpMailer {
    fn deliver(&self, message: &Message) -> Result<()> {
        let mailer = SmtpTransport::starttls_relay(&self.relay)
            .map_err(|e| NetPulseError::Alert(format!("relay setup failed: {}", e)))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build();
        mailer
            .send(message)
            .map_err(|e| NetPulseError::Alert(format!("send failed: {}", e)))?;
        Ok(())
    }
}

/// Composes and submits alert mail
pub struct AlertDispatcher {
    sender: String,
    transport: Box<dyn AlertTransport>,
}

impl AlertDispatcher {
    pub fn new(sender: String, transport: Box<dyn AlertTransport>) -> Self {
        Self { sender, transport }
    }

    /// Send one alert. Returns whether delivery succeeded; failure is logged
    /// and never propagated to the caller.
    pub fn send(&self, event: &AlertEvent) -> bool {
        match self.try_send(event) {
            Ok(()) => {
                log::info!("{} alert sent to {}", event.kind, event.recipient);
                true
            }
            Err(e) => {
                log::error!("failed to send {} alert to {}: {}", event.kind, event.recipient, e);
                false
            }
        }
    }

    fn try_send(&self, event: &AlertEvent) -> Result<()> {
        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e| NetPulseError::Alert(format!("invalid sender address: {}", e)))?;
        let to: Mailbox = event
            .recipient
            .parse()
            .map_err(|e| NetPulseError::Alert(format!("invalid recipient address: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(&event.subject);

        let message = match &event.attachment {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment.csv".to_string());
                let content_type = ContentType::parse("text/csv")
                    .map_err(|e| NetPulseError::Alert(format!("bad content type: {}", e)))?;
                let body = SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(event.body.clone());
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(body)
                        .singlepart(Attachment::new(filename).body(bytes, content_type)),
                )
            }
            None => builder.body(event.body.clone()),
        }
        .map_err(|e| NetPulseError::Alert(format!("message composition failed: {}", e)))?;

        self.transport.deliver(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTransport {
        delivered: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl AlertTransport for RecordingTransport {
        fn deliver(&self, message: &Message) -> Result<()> {
            if self.fail {
                return Err(NetPulseError::Alert("relay refused".to_string()));
            }
            let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
            self.delivered.lock().unwrap().push(raw);
            Ok(())
        }
    }

    #[test]
    fn test_send_plain_alert() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { delivered: Arc::clone(&delivered), fail: false };
        let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(transport));

        let event = AlertEvent::disconnection("admin@example.com", None);
        assert!(dispatcher.send(&event));

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Internet Disconnection Alert"));
        assert!(delivered[0].contains("admin@example.com"));
    }

    #[test]
    fn test_send_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Timestamp,Public IP,ISP,Download Speed,Upload Speed,Connected").unwrap();

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { delivered: Arc::clone(&delivered), fail: false };
        let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(transport));

        let event = AlertEvent::slow_speed("noc@example.com", 500.0, Some(path));
        assert!(dispatcher.send(&event));

        let delivered = delivered.lock().unwrap();
        assert!(delivered[0].contains("Slow Internet Alert"));
        assert!(delivered[0].contains("history.csv"));
        assert!(delivered[0].contains("multipart/mixed"));
        assert!(delivered[0].contains("500.00 Mbps"));
    }

    #[test]
    fn test_transport_failure_is_swallowed() {
        let transport = RecordingTransport { delivered: Arc::default(), fail: true };
        let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(transport));
        assert!(!dispatcher.send(&AlertEvent::disconnection("admin@example.com", None)));
    }

    #[test]
    fn test_missing_attachment_fails_without_panic() {
        let transport = RecordingTransport::default();
        let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(transport));
        let event = AlertEvent::disconnection(
            "admin@example.com",
            Some(PathBuf::from("/nonexistent/history.csv")),
        );
        assert!(!dispatcher.send(&event));
    }

    #[test]
    fn test_invalid_recipient_fails_cleanly() {
        let transport = RecordingTransport::default();
        let dispatcher = AlertDispatcher::new("monitor@example.com".to_string(), Box::new(transport));
        assert!(!dispatcher.send(&AlertEvent::disconnection("not-an-address", None)));
    }
}
