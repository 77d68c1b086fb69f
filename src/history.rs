//! Observation history with CSV export
//!
//! [`HistoryLog`] is the append-only sequence of past observations. The
//! monitoring cycle, manual refreshes, and on-demand speed tests all append
//! to it concurrently, so entries live behind a mutex and readers take a
//! consistent snapshot. History grows unbounded; callers that need a cap can
//! archive the exported CSV externally.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;
use crate::observation::{Observation, UNKNOWN};

/// Column order for history rows and CSV export
pub const CSV_HEADER: [&str; 6] = [
    "Timestamp",
    "Public IP",
    "ISP",
    "Download Speed",
    "Upload Speed",
    "Connected",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only log of observations, safe to share across tasks
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Mutex<Vec<Observation>>,
}

impl HistoryLog {
    /// Create an empty history log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation. Never fails; safe under concurrent callers.
    pub fn append(&self, observation: Observation) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observation);
    }

    /// Number of recorded observations
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent snapshot of all observations, oldest first
    pub fn snapshot(&self) -> Vec<Observation> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent observation, if any
    pub fn latest(&self) -> Option<Observation> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    /// Project the history into display/export rows in [`CSV_HEADER`] order
    pub fn to_rows(&self) -> Vec<[String; 6]> {
        self.snapshot().iter().map(format_row).collect()
    }

    /// Write the full history as CSV: header row plus one row per observation
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let rows = self.to_rows();
        let mut writer = BufWriter::new(File::create(path)?);
        write_csv_row(&mut writer, &CSV_HEADER.map(String::from))?;
        for row in &rows {
            write_csv_row(&mut writer, row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Overwrite-mode export used as the attachment for alert mail.
    ///
    /// Reflects the history at the moment of the triggering cycle: the rows
    /// are snapshotted under the lock before any writing starts.
    pub fn snapshot_csv(&self, path: &Path) -> Result<()> {
        self.export_csv(path)
    }
}

/// Flat label/value CSV of a single observation (current-state export)
pub fn export_current_csv(path: &Path, observation: &Observation) -> Result<()> {
    let speed = match (observation.download_mbps, observation.upload_mbps) {
        (Some(down), Some(up)) => {
            format!("{:.2} Mbps (Download), {:.2} Mbps (Upload)", down, up)
        }
        _ => UNKNOWN.to_string(),
    };

    let pairs: [(&str, String); 6] = [
        ("Label", "Value".to_string()),
        (
            "IP Address",
            observation.public_ip.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        ("ISP", observation.isp.clone()),
        (
            "Internet Status",
            if observation.connected { "Connected" } else { "Disconnected" }.to_string(),
        ),
        ("Network Info", observation.interfaces_display()),
        ("Speed", speed),
    ];

    let mut writer = BufWriter::new(File::create(path)?);
    for (label, value) in &pairs {
        write_csv_row(&mut writer, &[label.to_string(), value.clone()])?;
    }
    writer.flush()?;
    Ok(())
}

fn format_row(observation: &Observation) -> [String; 6] {
    [
        observation.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        observation
            .public_ip
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        observation.isp.clone(),
        observation
            .download_mbps
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        observation
            .upload_mbps
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        if observation.connected { "Yes" } else { "No" }.to_string(),
    ]
}

fn write_csv_row<W: Write>(writer: &mut W, fields: &[String]) -> Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{}", line)?;
    Ok(())
}

/// Quote a field when it contains a separator, quote, or newline
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
