//! Scanner session driver.
//!
//! [`ScannerSession`] wires the pure [`ScanMachine`] to the outside world.
//! Inputs arrive on one task: user controls, decoded payloads from the
//! camera, verdicts from spawned request tasks and resume timer ticks. Each
//! input is fed to the machine and the resulting [`Command`]s are executed
//! in order. Commands that complete with a new input (a camera start, a
//! switch) queue it behind the commands still pending, so every transition
//! is fully applied before the next one begins.
//!
//! Network requests and resume delays run as spawned tasks and report back
//! over channels; the session itself never blocks on either.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::mpsc;

use crate::audio::Beeper;
use crate::camera::{
    CameraBackend, CameraDescriptor, CameraError, CameraManager, CaptureConstraints,
    ResumeOutcome,
};
use crate::client::VerdictClient;
use crate::render::render_verdict;
use crate::report::{ScanRecord, SessionReport};
use crate::scanner::machine::{Command, Control, Readiness, ScanEvent, ScanMachine, ScannerState};
use crate::scanner::verdict::{classify, EventId, ScanRequest, ScanVerdict};
use crate::signal::ShutdownHandler;
use crate::view::ScannerView;

/// Default identifier of the preview container.
pub const DEFAULT_CONTAINER_ID: &str = "qr-reader";

/// Fixed parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Identifier of the preview surface.
    pub container_id: String,
    /// Event the attendance is recorded for.
    pub event_id: EventId,
    /// Fully resolved scan endpoint.
    pub api_endpoint: Url,
    /// Delay before scanning resumes after a duplicate or error.
    pub resume_delay: Duration,
    /// Capture parameters handed to the backend.
    pub constraints: CaptureConstraints,
}

impl SessionOptions {
    /// Options with the default container, delay and constraints.
    #[must_use]
    pub fn new(event_id: EventId, api_endpoint: Url) -> Self {
        Self {
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            event_id,
            api_endpoint,
            resume_delay: crate::scanner::machine::DEFAULT_RESUME_DELAY,
            constraints: CaptureConstraints::default(),
        }
    }
}

/// Whether capture may run against `endpoint`.
///
/// Only HTTPS endpoints qualify, plus plain HTTP to `localhost` or
/// `127.0.0.1` for development.
#[must_use]
pub fn is_secure_endpoint(endpoint: &Url) -> bool {
    endpoint.scheme() == "https"
        || matches!(endpoint.host_str(), Some("localhost" | "127.0.0.1"))
}

/// Sends controls into a running session from another task.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl ControlHandle {
    /// Queue a control. Returns `false` once the session is gone.
    pub fn send(&self, control: Control) -> bool {
        self.tx.send(control).is_ok()
    }
}

/// One scanner bound to a camera backend, a verdict client and a view.
pub struct ScannerSession<B, V> {
    options: SessionOptions,
    machine: ScanMachine,
    camera: CameraManager<B>,
    client: Arc<dyn VerdictClient>,
    view: V,
    beeper: Box<dyn Beeper>,
    shutdown: Option<ShutdownHandler>,
    controls_tx: mpsc::UnboundedSender<Control>,
    controls_rx: mpsc::UnboundedReceiver<Control>,
    verdict_tx: mpsc::UnboundedSender<ScanVerdict>,
    verdict_rx: mpsc::UnboundedReceiver<ScanVerdict>,
    timer_tx: mpsc::UnboundedSender<()>,
    timer_rx: mpsc::UnboundedReceiver<()>,
    submitted: Option<String>,
    report: SessionReport,
}

impl<B: CameraBackend, V: ScannerView> ScannerSession<B, V> {
    /// Create a session. Nothing is shown until [`initialize`](Self::initialize).
    pub fn new(
        options: SessionOptions,
        backend: B,
        client: Arc<dyn VerdictClient>,
        view: V,
        beeper: Box<dyn Beeper>,
    ) -> Self {
        let (controls_tx, controls_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let report = SessionReport::new(
            options.event_id.to_string(),
            options.api_endpoint.as_str(),
        );

        Self {
            machine: ScanMachine::new(options.resume_delay),
            camera: CameraManager::new(backend, options.constraints.clone()),
            options,
            client,
            view,
            beeper,
            shutdown: None,
            controls_tx,
            controls_rx,
            verdict_tx,
            verdict_rx,
            timer_tx,
            timer_rx,
            submitted: None,
            report,
        }
    }

    /// End [`run`](Self::run) when `handler` requests shutdown.
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = Some(handler);
        self
    }

    // ==================== Accessors ====================

    #[must_use]
    pub fn state(&self) -> ScannerState {
        self.machine.state()
    }

    /// Whether a capture device is held.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.machine.is_scanning()
    }

    /// Whether a verdict round trip is outstanding.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.machine.is_processing()
    }

    #[must_use]
    pub fn current_camera_id(&self) -> Option<&str> {
        self.camera.current_camera_id()
    }

    #[must_use]
    pub fn available_cameras(&self) -> &[CameraDescriptor] {
        self.camera.available_cameras()
    }

    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.options.event_id
    }

    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.options.container_id
    }

    #[must_use]
    pub fn api_endpoint(&self) -> &Url {
        &self.options.api_endpoint
    }

    #[must_use]
    pub fn camera(&self) -> &CameraManager<B> {
        &self.camera
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Verdicts shown so far.
    #[must_use]
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Handle for feeding controls from another task.
    #[must_use]
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.controls_tx.clone(),
        }
    }

    // ==================== Lifecycle ====================

    /// Check the environment and show the initial status and controls.
    pub async fn initialize(&mut self) -> Readiness {
        let readiness = if !is_secure_endpoint(&self.options.api_endpoint) {
            log::warn!(
                "Endpoint {} is not secure; capture disabled",
                self.options.api_endpoint
            );
            Readiness::InsecureContext
        } else if !self.camera.is_supported() {
            log::warn!("Capture backend is not supported on this system");
            Readiness::Unsupported
        } else {
            Readiness::Ready
        };

        log::info!(
            "Scanner '{}' ready for event {} ({:?})",
            self.options.container_id,
            self.options.event_id,
            readiness
        );
        let commands = self.machine.initialize(readiness);
        self.execute_all(commands).await;
        readiness
    }

    /// Apply one input and everything it triggers.
    pub async fn dispatch(&mut self, event: ScanEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let commands = self.machine.handle(event);
            for command in commands {
                if let Some(follow_up) = self.execute(command).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Wait for the next input and apply it.
    ///
    /// Returns `false` once shutdown has been requested.
    pub async fn tick(&mut self) -> bool {
        let shutdown = self.shutdown.clone();
        let event = tokio::select! {
            () = wait_for_shutdown(shutdown.as_ref()) => return false,
            Some(control) = self.controls_rx.recv() => ScanEvent::Control(control),
            Some(verdict) = self.verdict_rx.recv() => ScanEvent::Verdict(verdict),
            Some(()) = self.timer_rx.recv() => ScanEvent::ResumeTimerFired,
            payload = self.camera.next_decoded() => ScanEvent::Decoded(payload),
        };
        self.dispatch(event).await;
        true
    }

    /// Process inputs until shutdown, then release the camera.
    pub async fn run(&mut self) -> &SessionReport {
        while self.tick().await {}
        self.close().await;
        &self.report
    }

    /// Release the camera and stamp the report.
    pub async fn close(&mut self) {
        self.camera.stop().await;
        self.report.finish();
        log::info!(
            "Session for event {} closed after {} scan(s)",
            self.options.event_id,
            self.report.records.len()
        );
    }

    // ==================== Command execution ====================

    async fn execute_all(&mut self, commands: Vec<Command>) {
        for command in commands {
            if let Some(event) = self.execute(command).await {
                self.dispatch(event).await;
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Option<ScanEvent> {
        match command {
            Command::SetStatus { message, level } => self.view.set_status(&message, level),
            Command::SetControls(controls) => self.view.set_controls(controls),
            Command::ShowResult(verdict) => self.show_result(&verdict),
            Command::HideResult => self.view.hide_result(),
            Command::StartCamera => return Some(self.start_camera().await),
            Command::StopCamera => self.camera.stop().await,
            Command::PauseCamera => {
                if let Err(e) = self.camera.pause().await {
                    log::warn!("Failed to pause scanner: {}", e);
                }
            }
            Command::ResumeCamera => match self.camera.resume().await {
                Ok(ResumeOutcome::Restarted) => log::debug!("Scanner restarted after failed resume"),
                Ok(_) => {}
                Err(e) => return Some(ScanEvent::CameraFailed(e)),
            },
            Command::SwitchCamera => return Some(self.switch_camera().await),
            Command::PlayCue => {
                if let Err(e) = self.beeper.beep() {
                    log::trace!("Scan cue unavailable: {}", e);
                }
            }
            Command::Submit(payload) => self.submit(payload),
            Command::ScheduleResume(delay) => self.schedule_resume(delay),
        }
        None
    }

    async fn start_camera(&mut self) -> ScanEvent {
        match self.camera.start().await {
            Ok(()) => ScanEvent::CameraStarted {
                camera_count: self.camera.available_cameras().len(),
            },
            Err(e) => ScanEvent::CameraFailed(e),
        }
    }

    async fn switch_camera(&mut self) -> ScanEvent {
        match self.camera.switch_camera().await {
            Ok(_) if self.camera.is_scanning() => ScanEvent::CameraStarted {
                camera_count: self.camera.available_cameras().len(),
            },
            Ok(_) => ScanEvent::SwitchFailed(CameraError::Backend(
                "no camera to switch to".to_string(),
            )),
            Err(e) => ScanEvent::SwitchFailed(e),
        }
    }

    fn show_result(&mut self, verdict: &ScanVerdict) {
        let html = render_verdict(verdict).unwrap_or_else(|e| {
            log::error!("{}", e);
            String::new()
        });
        self.view.show_result(verdict, &html);
        self.report.push(ScanRecord::new(self.submitted.take(), verdict));
    }

    fn submit(&mut self, payload: String) {
        log::info!("QR Code detected: {}", payload);
        self.submitted = Some(payload.clone());

        let request = ScanRequest {
            qr_code: payload,
            event_id: self.options.event_id.clone(),
        };
        let client = Arc::clone(&self.client);
        let tx = self.verdict_tx.clone();
        tokio::spawn(async move {
            let verdict = classify(client.submit(&request).await);
            if tx.send(verdict).is_err() {
                log::debug!("Session closed before the verdict arrived");
            }
        });
    }

    fn schedule_resume(&self, delay: Duration) {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });
    }
}

async fn wait_for_shutdown(handler: Option<&ShutdownHandler>) {
    match handler {
        Some(handler) => handler.wait().await,
        None => std::future::pending().await,
    }
}
