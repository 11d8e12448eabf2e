//! Scan verdicts and server response classification.
//!
//! The scan endpoint answers with a JSON object whose `status` field decides
//! the outcome:
//!
//! - `"success"`: attendance recorded ([`ScanVerdict::Success`])
//! - `"duplicate"`: already recorded earlier ([`ScanVerdict::Duplicate`])
//! - anything else: rejected ([`ScanVerdict::Error`])
//!
//! Transport failures and non-2xx responses never reach the classifier as
//! data; [`classify`] folds them into an `Error` verdict with a generic
//! network message so callers always get a renderable outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::DispatchError;

/// Fallback message for a rejected scan without a server message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Invalid QR code";

/// Message shown when the round trip itself failed.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Event identifier sent with every scan.
///
/// Serialised as a JSON number when it is an integer, otherwise as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Numeric(i64),
    Text(String),
}

impl FromStr for EventId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Event id cannot be empty".to_string());
        }
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Numeric))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Request body for the scan endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    /// Decoded payload, forwarded verbatim.
    pub qr_code: String,
    /// Event the attendance is recorded for.
    pub event_id: EventId,
}

/// Response body from the scan endpoint. Every field but `status` is optional.
///
/// Fields are read leniently: numbers and booleans become their text form,
/// while `null`, arrays and objects count as absent. A missing or non-text
/// `status` classifies as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanResponse {
    #[serde(default, deserialize_with = "status_text")]
    pub status: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub student_email: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub scan_time: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub message: Option<String>,
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

fn status_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Attendance was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub event_name: Option<String>,
    pub timestamp: Option<String>,
}

/// The code had already been scanned for this event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateNotice {
    pub student_name: Option<String>,
    pub scan_time: Option<String>,
}

/// Where a failed scan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The server rejected the code.
    Server,
    /// The round trip failed (transport error or non-2xx status).
    Network,
}

/// The scan was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub kind: FailureKind,
    /// Always non-empty.
    pub message: String,
}

/// Classified outcome of one round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanVerdict {
    Success(AttendanceRecord),
    Duplicate(DuplicateNotice),
    Error(ScanFailure),
}

impl ScanVerdict {
    /// Verdict for a failed round trip.
    #[must_use]
    pub fn network_error() -> Self {
        Self::Error(ScanFailure {
            kind: FailureKind::Network,
            message: NETWORK_ERROR_MESSAGE.to_string(),
        })
    }

    /// Short outcome name (`success`, `duplicate`, `error`).
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Duplicate(_) => "duplicate",
            Self::Error(_) => "error",
        }
    }

    /// Whether scanning should resume automatically after this verdict.
    #[must_use]
    pub fn resumes_automatically(&self) -> bool {
        !matches!(self, Self::Success(_))
    }

    /// Student name, if the verdict carries one.
    #[must_use]
    pub fn student_name(&self) -> Option<&str> {
        match self {
            Self::Success(r) => r.student_name.as_deref(),
            Self::Duplicate(d) => d.student_name.as_deref(),
            Self::Error(_) => None,
        }
    }
}

impl From<ScanResponse> for ScanVerdict {
    fn from(response: ScanResponse) -> Self {
        match response.status.as_str() {
            "success" => Self::Success(AttendanceRecord {
                student_name: response.student_name,
                student_email: response.student_email,
                event_name: response.event_name,
                timestamp: response.timestamp,
            }),
            "duplicate" => Self::Duplicate(DuplicateNotice {
                student_name: response.student_name,
                scan_time: response.scan_time,
            }),
            _ => Self::Error(ScanFailure {
                kind: FailureKind::Server,
                message: response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            }),
        }
    }
}

/// Fold the result of a round trip into exactly one verdict.
#[must_use]
pub fn classify(result: Result<ScanResponse, DispatchError>) -> ScanVerdict {
    match result {
        Ok(response) => ScanVerdict::from(response),
        Err(e) => {
            log::error!("Server error: {}", e);
            ScanVerdict::network_error()
        }
    }
}
