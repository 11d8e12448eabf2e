//! Scanner state machine.
//!
//! # Overview
//!
//! [`ScanMachine`] holds the whole scanning workflow as explicit state and
//! turns every input ([`ScanEvent`]) into a list of side effects
//! ([`Command`]) for the session to execute. It never touches the camera,
//! the network or the view itself, so every transition is unit-testable.
//!
//! ```text
//!            Start                 CameraStarted            Decoded
//!   Idle ───────────▶ Starting ─────────────────▶ Scanning ─────────▶ Processing
//!    ▲                   │ CameraFailed               ▲                  │ Verdict
//!    └───────────────────┘                            │                  ├─ success ──▶ Stopped
//!                                    ResumeTimerFired │                  │
//!                                  ResumeScheduled ◀──┴──────────────────┴─ duplicate / error
//! ```
//!
//! # In-flight guard
//!
//! At most one verdict round trip is outstanding per session. The guard is
//! tracked separately from the state so that stopping (and even restarting)
//! while a request is pending cannot release it early: only the verdict
//! itself clears it.
//!
//! # Example
//!
//! ```
//! use qrattend::scanner::machine::{Command, Control, ScanEvent, ScanMachine, ScannerState};
//! use std::time::Duration;
//!
//! let mut machine = ScanMachine::new(Duration::from_secs(2));
//! let commands = machine.handle(ScanEvent::Control(Control::Start));
//! assert!(commands.contains(&Command::StartCamera));
//! assert_eq!(machine.state(), ScannerState::Starting);
//! ```

use std::time::Duration;

use crate::camera::CameraError;
use crate::render::{verdict_status, StatusLevel};
use crate::scanner::verdict::ScanVerdict;

/// Default delay before scanning resumes after a duplicate or error.
pub const DEFAULT_RESUME_DELAY: Duration = Duration::from_millis(2000);

pub const STATUS_READY: &str = "Ready - start the scanner to begin";
pub const STATUS_REQUESTING: &str = "Requesting camera access...";
pub const STATUS_ACTIVE: &str = "Scanner active - Point camera at QR code";
pub const STATUS_PROCESSING: &str = "Processing QR code...";
pub const STATUS_STOPPED: &str = "Scanner stopped";
pub const STATUS_SWITCHING: &str = "Switching camera...";
pub const STATUS_SWITCH_FAILED: &str = "Failed to switch camera";
pub const STATUS_INSECURE: &str = "Camera requires HTTPS. Please use a secure connection.";
pub const STATUS_UNSUPPORTED: &str = "Camera capture is not supported on this system.";

/// Workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScannerState {
    /// Scanning cannot work here (insecure context or no capture support).
    Disabled,
    /// No device held; waiting for the user to start.
    #[default]
    Idle,
    /// Waiting for the camera to start.
    Starting,
    /// Decode loop running.
    Scanning,
    /// Camera paused while the verdict round trip is outstanding.
    Processing,
    /// Verdict shown; camera paused until the resume timer fires.
    ResumeScheduled,
    /// Attendance recorded; camera released until the user asks for the next scan.
    Stopped,
}

impl ScannerState {
    /// Whether a capture device is held in this state.
    #[must_use]
    pub fn holds_camera(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Scanning | Self::Processing | Self::ResumeScheduled
        )
    }
}

/// Environment readiness checked once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The endpoint is neither HTTPS nor local.
    InsecureContext,
    /// The capture backend is unavailable.
    Unsupported,
}

/// User-facing controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
    ScanNext,
    SwitchCamera,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Control(Control),
    /// The camera started (or restarted) with this many devices enumerated.
    CameraStarted { camera_count: usize },
    /// A start or resume-recovery attempt failed.
    CameraFailed(CameraError),
    /// Switching to the next device failed; nothing is held any more.
    SwitchFailed(CameraError),
    /// The decode loop produced a payload.
    Decoded(String),
    /// The round trip for the in-flight payload completed.
    Verdict(ScanVerdict),
    /// A previously scheduled resume delay elapsed.
    ResumeTimerFired,
}

/// Enabled/visible state of the controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub scan_next_visible: bool,
}

impl Controls {
    /// Nothing usable.
    pub const DISABLED: Self = Self {
        start_enabled: false,
        stop_enabled: false,
        scan_next_visible: false,
    };
    /// Ready to start.
    pub const READY: Self = Self {
        start_enabled: true,
        stop_enabled: false,
        scan_next_visible: false,
    };
    /// Camera running or starting.
    pub const RUNNING: Self = Self {
        start_enabled: false,
        stop_enabled: true,
        scan_next_visible: false,
    };
    /// Attendance recorded; offer the next scan.
    pub const SCAN_NEXT: Self = Self {
        start_enabled: true,
        stop_enabled: false,
        scan_next_visible: true,
    };
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetStatus { message: String, level: StatusLevel },
    SetControls(Controls),
    ShowResult(ScanVerdict),
    HideResult,
    StartCamera,
    StopCamera,
    PauseCamera,
    ResumeCamera,
    SwitchCamera,
    /// Short audible cue; failures are ignored.
    PlayCue,
    /// Send the payload to the server (exactly once per accepted decode).
    Submit(String),
    /// Deliver [`ScanEvent::ResumeTimerFired`] after the delay.
    ScheduleResume(Duration),
}

fn status(message: impl Into<String>, level: StatusLevel) -> Command {
    Command::SetStatus {
        message: message.into(),
        level,
    }
}

/// The scanning workflow as a pure transition function.
#[derive(Debug, Clone)]
pub struct ScanMachine {
    state: ScannerState,
    in_flight: bool,
    camera_count: usize,
    resume_delay: Duration,
}

impl Default for ScanMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RESUME_DELAY)
    }
}

impl ScanMachine {
    /// Create an idle machine.
    #[must_use]
    pub fn new(resume_delay: Duration) -> Self {
        Self {
            state: ScannerState::Idle,
            in_flight: false,
            camera_count: 0,
            resume_delay,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// Whether a capture device is held.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state.holds_camera()
    }

    /// Whether a verdict round trip is outstanding.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.in_flight
    }

    /// Delay applied by [`Command::ScheduleResume`].
    #[must_use]
    pub fn resume_delay(&self) -> Duration {
        self.resume_delay
    }

    fn set_state(&mut self, next: ScannerState) {
        if self.state != next {
            log::debug!("Scanner transition: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Apply the environment checks and emit the initial view state.
    pub fn initialize(&mut self, readiness: Readiness) -> Vec<Command> {
        match readiness {
            Readiness::Ready => {
                self.set_state(ScannerState::Idle);
                vec![
                    Command::SetControls(Controls::READY),
                    status(STATUS_READY, StatusLevel::Info),
                ]
            }
            Readiness::InsecureContext => {
                self.set_state(ScannerState::Disabled);
                vec![
                    status(STATUS_INSECURE, StatusLevel::Error),
                    Command::SetControls(Controls::DISABLED),
                ]
            }
            Readiness::Unsupported => {
                self.set_state(ScannerState::Disabled);
                vec![
                    status(STATUS_UNSUPPORTED, StatusLevel::Error),
                    Command::SetControls(Controls::DISABLED),
                ]
            }
        }
    }

    /// Apply one event and return the side effects to execute.
    pub fn handle(&mut self, event: ScanEvent) -> Vec<Command> {
        if self.state == ScannerState::Disabled {
            log::debug!("Scanner disabled; ignoring {:?}", event);
            return Vec::new();
        }

        match event {
            ScanEvent::Control(Control::Start) => self.on_start(false),
            ScanEvent::Control(Control::ScanNext) => self.on_start(true),
            ScanEvent::Control(Control::Stop) => self.on_stop(),
            ScanEvent::Control(Control::SwitchCamera) => self.on_switch(),
            ScanEvent::CameraStarted { camera_count } => self.on_camera_started(camera_count),
            ScanEvent::CameraFailed(err) => self.on_camera_failed(&err),
            ScanEvent::SwitchFailed(err) => self.on_switch_failed(&err),
            ScanEvent::Decoded(payload) => self.on_decoded(payload),
            ScanEvent::Verdict(verdict) => self.on_verdict(verdict),
            ScanEvent::ResumeTimerFired => self.on_resume_timer(),
        }
    }

    fn on_start(&mut self, scan_next: bool) -> Vec<Command> {
        if !matches!(self.state, ScannerState::Idle | ScannerState::Stopped) {
            log::debug!("Start ignored in state {:?}", self.state);
            return Vec::new();
        }

        let mut commands = Vec::new();
        if scan_next {
            commands.push(Command::HideResult);
        }
        commands.push(status(STATUS_REQUESTING, StatusLevel::Info));
        commands.push(Command::SetControls(Controls::RUNNING));
        commands.push(Command::StartCamera);
        self.set_state(ScannerState::Starting);
        commands
    }

    fn on_stop(&mut self) -> Vec<Command> {
        if !self.state.holds_camera() {
            return Vec::new();
        }
        if self.in_flight {
            log::debug!("Stopping with a request in flight; its verdict will still be shown");
        }
        self.set_state(ScannerState::Idle);
        vec![
            Command::StopCamera,
            Command::SetControls(Controls::READY),
            status(STATUS_STOPPED, StatusLevel::Info),
        ]
    }

    fn on_switch(&mut self) -> Vec<Command> {
        if self.state != ScannerState::Scanning || self.camera_count < 2 {
            log::debug!(
                "Switch ignored (state {:?}, {} cameras)",
                self.state,
                self.camera_count
            );
            return Vec::new();
        }
        self.set_state(ScannerState::Starting);
        vec![
            status(STATUS_SWITCHING, StatusLevel::Info),
            Command::SwitchCamera,
        ]
    }

    fn on_camera_started(&mut self, camera_count: usize) -> Vec<Command> {
        self.camera_count = camera_count;
        match self.state {
            ScannerState::Starting => {
                self.set_state(ScannerState::Scanning);
                vec![status(STATUS_ACTIVE, StatusLevel::Success)]
            }
            ScannerState::Idle | ScannerState::Stopped => {
                // Stopped while the start was pending.
                vec![Command::StopCamera]
            }
            _ => Vec::new(),
        }
    }

    fn on_camera_failed(&mut self, err: &CameraError) -> Vec<Command> {
        log::error!("Failed to start scanner: {}", err);
        self.set_state(ScannerState::Idle);
        vec![
            status(err.user_message(), StatusLevel::Error),
            Command::SetControls(Controls::READY),
        ]
    }

    fn on_switch_failed(&mut self, err: &CameraError) -> Vec<Command> {
        log::error!("Failed to switch camera: {}", err);
        self.set_state(ScannerState::Idle);
        vec![
            status(
                format!("{}. {}", STATUS_SWITCH_FAILED, err.user_message()),
                StatusLevel::Error,
            ),
            Command::SetControls(Controls::READY),
        ]
    }

    fn on_decoded(&mut self, payload: String) -> Vec<Command> {
        if self.state != ScannerState::Scanning || self.in_flight {
            log::trace!("Dropping decode in state {:?}", self.state);
            return Vec::new();
        }

        self.in_flight = true;
        self.set_state(ScannerState::Processing);
        vec![
            Command::PauseCamera,
            status(STATUS_PROCESSING, StatusLevel::Info),
            Command::PlayCue,
            Command::Submit(payload),
        ]
    }

    fn on_verdict(&mut self, verdict: ScanVerdict) -> Vec<Command> {
        // Released whatever the outcome.
        self.in_flight = false;

        let owns_outcome = self.state == ScannerState::Processing;
        let (message, level) = verdict_status(&verdict);
        let resumes = verdict.resumes_automatically();

        let mut commands = vec![Command::ShowResult(verdict), status(message, level)];

        if resumes {
            commands.push(Command::ScheduleResume(self.resume_delay));
            if owns_outcome {
                self.set_state(ScannerState::ResumeScheduled);
            }
        } else if owns_outcome {
            commands.push(Command::SetControls(Controls::SCAN_NEXT));
            commands.push(Command::StopCamera);
            self.set_state(ScannerState::Stopped);
        }

        commands
    }

    fn on_resume_timer(&mut self) -> Vec<Command> {
        match self.state {
            ScannerState::ResumeScheduled => {
                self.set_state(ScannerState::Scanning);
                vec![
                    Command::ResumeCamera,
                    status(STATUS_ACTIVE, StatusLevel::Success),
                ]
            }
            // The timer is never cancelled. If the user restarted within the
            // delay, it still pokes the live camera.
            ScannerState::Scanning => vec![Command::ResumeCamera],
            _ => {
                log::debug!("Resume timer fired in state {:?}; nothing to resume", self.state);
                Vec::new()
            }
        }
    }
}
