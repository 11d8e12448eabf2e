//! Session history and reports.
//!
//! Every verdict the session shows is recorded as a [`ScanRecord`]. On exit
//! the history can be written out as:
//! - JSON for automation ([`json::JsonReport`])
//! - CSV for spreadsheet import ([`csv::CsvReport`])

pub mod csv;
pub mod json;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::scanner::verdict::ScanVerdict;

pub use self::csv::CsvReport;
pub use self::json::JsonReport;

/// Errors writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One handled scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    /// When the verdict was shown.
    pub scanned_at: DateTime<Local>,
    /// The decoded payload, if the verdict belongs to a known submission.
    pub qr_code: Option<String>,
    /// `success`, `duplicate` or `error`.
    pub outcome: &'static str,
    pub student_name: Option<String>,
    /// Server or network message for errors.
    pub message: Option<String>,
}

impl ScanRecord {
    /// Record a verdict shown now.
    #[must_use]
    pub fn new(qr_code: Option<String>, verdict: &ScanVerdict) -> Self {
        let message = match verdict {
            ScanVerdict::Error(failure) => Some(failure.message.clone()),
            _ => None,
        };
        Self {
            scanned_at: Local::now(),
            qr_code,
            outcome: verdict.outcome(),
            student_name: verdict.student_name().map(str::to_string),
            message,
        }
    }
}

/// Per-outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub success: usize,
    pub duplicate: usize,
    pub error: usize,
}

/// History of one scanner session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub event_id: String,
    pub endpoint: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub records: Vec<ScanRecord>,
}

impl SessionReport {
    /// Start an empty report.
    #[must_use]
    pub fn new(event_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            endpoint: endpoint.into(),
            started_at: Local::now(),
            finished_at: None,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: ScanRecord) {
        self.records.push(record);
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            total: self.records.len(),
            ..ReportSummary::default()
        };
        for record in &self.records {
            match record.outcome {
                "success" => summary.success += 1,
                "duplicate" => summary.duplicate += 1,
                _ => summary.error += 1,
            }
        }
        summary
    }
}
