//! Presentation of scan verdicts.
//!
//! Verdicts are rendered into HTML fragments with the `askama` template
//! engine, one template per outcome (`templates/cards/*.html`). Every field
//! is interpolated through askama's HTML escaper: names, emails and server
//! messages are never trusted as pre-sanitised.
//!
//! # Example
//!
//! ```
//! use qrattend::render::render_verdict;
//! use qrattend::scanner::verdict::{AttendanceRecord, ScanVerdict};
//!
//! let verdict = ScanVerdict::Success(AttendanceRecord {
//!     student_name: Some("A&B".into()),
//!     ..AttendanceRecord::default()
//! });
//! let html = render_verdict(&verdict).unwrap();
//! assert!(html.contains("A&amp;B"));
//! ```

use std::fmt;

use askama::Template;
use chrono::Local;
use thiserror::Error;

use crate::scanner::verdict::{
    AttendanceRecord, DuplicateNotice, FailureKind, ScanFailure, ScanVerdict,
};

/// Placeholder for fields the server left out.
const MISSING: &str = "N/A";

/// Severity of the status line, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    /// CSS class of the status element (`status-info`, ...).
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Info => "status-info",
            Self::Success => "status-success",
            Self::Warning => "status-warning",
            Self::Error => "status-error",
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Styling of the result panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Warning,
    Error,
}

impl ResultKind {
    /// CSS class of the result panel (`result-success`, ...).
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "result-success",
            Self::Warning => "result-warning",
            Self::Error => "result-error",
        }
    }
}

impl From<&ScanVerdict> for ResultKind {
    fn from(verdict: &ScanVerdict) -> Self {
        match verdict {
            ScanVerdict::Success(_) => Self::Success,
            ScanVerdict::Duplicate(_) => Self::Warning,
            ScanVerdict::Error(_) => Self::Error,
        }
    }
}

/// Error rendering a result card.
#[derive(Debug, Error)]
#[error("failed to render result card: {0}")]
pub struct RenderError(#[from] askama::Error);

#[derive(Template)]
#[template(path = "cards/success.html")]
struct SuccessCard<'a> {
    student_name: &'a str,
    student_email: &'a str,
    event_name: &'a str,
    timestamp: String,
}

#[derive(Template)]
#[template(path = "cards/duplicate.html")]
struct DuplicateCard<'a> {
    student_name: &'a str,
    scan_time: &'a str,
}

#[derive(Template)]
#[template(path = "cards/error.html")]
struct ErrorCard<'a> {
    message: &'a str,
}

fn or_missing(field: &Option<String>) -> &str {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(MISSING)
}

fn success_time(record: &AttendanceRecord) -> String {
    record
        .timestamp
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(local_now)
}

fn local_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render a verdict into its HTML result card.
///
/// # Errors
///
/// Returns [`RenderError`] if the template engine fails to format.
pub fn render_verdict(verdict: &ScanVerdict) -> Result<String, RenderError> {
    let html = match verdict {
        ScanVerdict::Success(record) => SuccessCard {
            student_name: or_missing(&record.student_name),
            student_email: or_missing(&record.student_email),
            event_name: or_missing(&record.event_name),
            timestamp: success_time(record),
        }
        .render()?,
        ScanVerdict::Duplicate(notice) => DuplicateCard {
            student_name: or_missing(&notice.student_name),
            scan_time: or_missing(&notice.scan_time),
        }
        .render()?,
        ScanVerdict::Error(failure) => ErrorCard {
            message: &failure.message,
        }
        .render()?,
    };
    Ok(html)
}

/// Render a verdict as plain text for terminal output.
#[must_use]
pub fn render_text(verdict: &ScanVerdict) -> String {
    match verdict {
        ScanVerdict::Success(record) => format!(
            "Attendance Marked!\n  Student: {}\n  Email:   {}\n  Event:   {}\n  Time:    {}",
            or_missing(&record.student_name),
            or_missing(&record.student_email),
            or_missing(&record.event_name),
            success_time(record),
        ),
        ScanVerdict::Duplicate(DuplicateNotice {
            student_name,
            scan_time,
        }) => format!(
            "Already Scanned\n  Student:       {}\n  Previous Scan: {}\n  This student's attendance was already recorded.",
            or_missing(student_name),
            or_missing(scan_time),
        ),
        ScanVerdict::Error(ScanFailure { message, .. }) => {
            format!("Scan Failed\n  {}", message)
        }
    }
}

/// Status line shown after a verdict is rendered.
#[must_use]
pub fn verdict_status(verdict: &ScanVerdict) -> (String, StatusLevel) {
    match verdict {
        ScanVerdict::Success(_) => (
            "✓ Attendance marked successfully!".to_string(),
            StatusLevel::Success,
        ),
        ScanVerdict::Duplicate(_) => ("⚠ Already scanned".to_string(), StatusLevel::Warning),
        ScanVerdict::Error(ScanFailure {
            kind: FailureKind::Network,
            ..
        }) => ("✗ Network error".to_string(), StatusLevel::Error),
        ScanVerdict::Error(ScanFailure { message, .. }) => {
            (format!("✗ {}", message), StatusLevel::Error)
        }
    }
}
