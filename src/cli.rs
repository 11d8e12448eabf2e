//! Command-line interface definitions for qrattend.
//!
//! Global options control verbosity and error formatting; subcommands run a
//! scanner session or list the configured capture devices.
//!
//! # Example
//!
//! ```bash
//! # Scan for event 42 against the default local server
//! qrattend scan --event-id 42 --device "Desk (back)=/dev/ttyACM0"
//!
//! # Write a CSV report of the session on exit
//! qrattend scan --event-id 42 --report scans.csv --report-format csv
//!
//! # Show which device would be picked
//! qrattend devices --device /dev/ttyACM0 --device /dev/ttyACM1
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::camera::LineDevice;
use crate::config::Config;
use crate::scanner::verdict::EventId;

/// Attendance scanner: decodes QR codes and records them against an event.
#[derive(Debug, Parser)]
#[command(name = "qrattend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scanner for an event
    Scan(ScanArgs),
    /// List capture devices and the one that would be selected
    Devices(DevicesArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Event the attendance is recorded for
    #[arg(long, value_name = "ID")]
    pub event_id: EventId,

    /// Base URL of the attendance server
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Scan endpoint, relative to the server or absolute
    #[arg(long, value_name = "PATH")]
    pub endpoint: Option<String>,

    /// Capture device as LABEL=PATH or PATH (repeatable)
    ///
    /// Replaces the devices from the configuration file.
    #[arg(short, long = "device", value_name = "LABEL=PATH")]
    pub devices: Vec<LineDevice>,

    /// Delay in milliseconds before scanning resumes after a duplicate or error
    #[arg(long, value_name = "MS")]
    pub resume_delay: Option<u64>,

    /// Do not ring the terminal bell on each scan
    #[arg(long)]
    pub no_beep: bool,

    /// Mirror the current result card as HTML to this file
    #[arg(long, value_name = "PATH")]
    pub html_out: Option<PathBuf>,

    /// Write a report of all scans to this file on exit
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "json", requires = "report")]
    pub report_format: ReportFormat,

    /// Wait for the 'start' command instead of starting immediately
    #[arg(long)]
    pub no_auto_start: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ScanArgs {
    /// Apply flags over the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server_url.clone_from(server);
        }
        if let Some(endpoint) = &self.endpoint {
            config.api_endpoint.clone_from(endpoint);
        }
        if !self.devices.is_empty() {
            config.devices.clone_from(&self.devices);
        }
        if let Some(delay) = self.resume_delay {
            config.resume_delay_ms = delay;
        }
        if self.no_beep {
            config.beep = false;
        }
    }
}

/// Arguments for the devices subcommand.
#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Capture device as LABEL=PATH or PATH (repeatable)
    #[arg(short, long = "device", value_name = "LABEL=PATH")]
    pub devices: Vec<LineDevice>,

    /// Store the given devices in the configuration file
    #[arg(long, requires = "devices")]
    pub save: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Session report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
