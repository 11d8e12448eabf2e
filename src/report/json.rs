//! JSON report writer.
//!
//! The document is the [`SessionReport`] itself plus a `summary` object:
//!
//! ```json
//! {
//!   "event_id": "42",
//!   "summary": { "total": 2, "success": 1, "duplicate": 1, "error": 0 },
//!   "records": [ ... ]
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::{ReportError, ReportSummary, SessionReport};

#[derive(Serialize)]
struct JsonDocument<'a> {
    #[serde(flatten)]
    report: &'a SessionReport,
    summary: ReportSummary,
}

/// JSON formatter for a [`SessionReport`].
pub struct JsonReport<'a> {
    report: &'a SessionReport,
}

impl<'a> JsonReport<'a> {
    #[must_use]
    pub fn new(report: &'a SessionReport) -> Self {
        Self { report }
    }

    fn document(&self) -> JsonDocument<'a> {
        JsonDocument {
            report: self.report,
            summary: self.report.summary(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut writer, &self.document())?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
