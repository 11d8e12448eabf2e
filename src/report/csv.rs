//! CSV report writer.
//!
//! One row per handled scan with the columns `scanned_at` (RFC 3339),
//! `qr_code`, `outcome`, `student_name` and `message`.

use std::io;

use serde::Serialize;

use super::{ReportError, SessionReport};

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    scanned_at: String,
    qr_code: &'a str,
    outcome: &'a str,
    student_name: &'a str,
    message: &'a str,
}

/// CSV formatter for a [`SessionReport`].
pub struct CsvReport<'a> {
    report: &'a SessionReport,
}

impl<'a> CsvReport<'a> {
    #[must_use]
    pub fn new(report: &'a SessionReport) -> Self {
        Self { report }
    }

    /// Write the rows to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization or writing fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = ::csv::Writer::from_writer(writer);
        for record in &self.report.records {
            csv_writer.serialize(CsvRow {
                scanned_at: record.scanned_at.to_rfc3339(),
                qr_code: record.qr_code.as_deref().unwrap_or_default(),
                outcome: record.outcome,
                student_name: record.student_name.as_deref().unwrap_or_default(),
                message: record.message.as_deref().unwrap_or_default(),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// CSV as a string.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization fails.
    pub fn to_csv_string(&self) -> Result<String, ReportError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
