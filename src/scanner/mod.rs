//! Scan-result dispatching.
//!
//! - [`machine`]: the scanning workflow as a pure state machine
//! - [`session`]: the async driver executing the machine's commands
//! - [`verdict`]: request/response types and outcome classification

pub mod machine;
pub mod session;
pub mod verdict;

pub use machine::{Command, Control, Controls, Readiness, ScanEvent, ScanMachine, ScannerState};
pub use session::{ControlHandle, ScannerSession, SessionOptions};
pub use verdict::{classify, EventId, ScanRequest, ScanResponse, ScanVerdict};
