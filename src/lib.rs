//! qrattend - QR attendance scanner
//!
//! Reads QR codes from a capture device, submits each one to an attendance
//! server for an event, and shows whether the attendee was recorded, had
//! already been scanned, or was rejected.

pub mod audio;
pub mod camera;
pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod render;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod view;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use crate::audio::{Beeper, Silent, TerminalBell};
use crate::camera::{select_camera, CameraBackend, CaptureConstraints, LineCamera};
use crate::cli::{Cli, Commands, DevicesArgs, ReportFormat, ScanArgs};
use crate::client::{resolve_endpoint, HttpVerdictClient};
use crate::config::Config;
use crate::error::ExitCode;
use crate::report::{CsvReport, JsonReport, SessionReport};
use crate::scanner::{Control, Readiness, ScanEvent, ScannerSession, SessionOptions};
use crate::view::TerminalView;

/// Run the command selected on the command line.
///
/// # Errors
///
/// Returns an error if configuration, the runtime or the selected command
/// fails.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let color = !cli.no_color;
    let result = match cli.command {
        Commands::Scan(args) => runtime.block_on(run_scan(args, color)),
        Commands::Devices(args) => runtime.block_on(list_devices(args)),
    };

    // The console task may still be blocked reading stdin.
    runtime.shutdown_background();
    result
}

async fn run_scan(args: ScanArgs, color: bool) -> Result<ExitCode> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate()?;

    let endpoint = resolve_endpoint(&config.server_url, &config.api_endpoint)?;
    let client = HttpVerdictClient::new(
        endpoint.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let mut options = SessionOptions::new(args.event_id.clone(), endpoint);
    options.container_id.clone_from(&config.container_id);
    options.resume_delay = Duration::from_millis(config.resume_delay_ms);
    options.constraints = CaptureConstraints::default().with_fps(config.fps);

    let beeper: Box<dyn Beeper> = if config.beep {
        Box::new(TerminalBell)
    } else {
        Box::new(Silent)
    };
    let shutdown = signal::install_handler()?;
    let view = TerminalView::stdout(color, args.html_out.clone());

    let mut session = ScannerSession::new(
        options,
        LineCamera::new(config.devices.clone()),
        Arc::new(client),
        view,
        beeper,
    )
    .with_shutdown(shutdown.clone());

    if session.initialize().await != Readiness::Ready {
        return Ok(ExitCode::Unavailable);
    }

    tokio::spawn(console::run_console(
        BufReader::new(tokio::io::stdin()),
        session.control_handle(),
        shutdown.clone(),
    ));
    eprintln!("{}", console::HELP_TEXT);

    if !args.no_auto_start {
        session.dispatch(ScanEvent::Control(Control::Start)).await;
    }

    let report = session.run().await;
    if let Some(path) = &args.report {
        write_report(report, path, args.report_format)?;
        log::info!("Wrote {} report to {}", args.report_format, path.display());
    }

    Ok(if shutdown.was_interrupted() {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    })
}

async fn list_devices(args: DevicesArgs) -> Result<ExitCode> {
    let mut config = Config::load(args.config.as_deref())?;
    if !args.devices.is_empty() {
        config.devices = args.devices;
    }
    if args.save {
        let path = args
            .config
            .clone()
            .or_else(Config::config_path)
            .context("no configuration directory available")?;
        config.save(&path)?;
        log::info!("Saved {} device(s) to {}", config.devices.len(), path.display());
    }

    let mut camera = LineCamera::new(config.devices);
    let cameras = camera
        .enumerate()
        .await
        .context("failed to enumerate devices")?;
    if cameras.is_empty() {
        eprintln!("No capture devices found.");
        return Ok(ExitCode::Unavailable);
    }

    let selected = select_camera(&cameras).map(|camera| camera.id.clone());
    for camera in &cameras {
        let marker = if selected.as_deref() == Some(camera.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {} ({})", marker, camera.label, camera.id);
    }
    Ok(ExitCode::Success)
}

fn write_report(report: &SessionReport, path: &Path, format: ReportFormat) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        ReportFormat::Json => JsonReport::new(report).write_to(writer)?,
        ReportFormat::Csv => CsvReport::new(report).write_to(writer)?,
    }
    Ok(())
}
