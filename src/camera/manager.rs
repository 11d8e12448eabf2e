//! Camera session manager.
//!
//! [`CameraManager`] owns a [`CameraBackend`] and enforces the capture
//! lifecycle:
//!
//! - `start` requests permission, enumerates devices, applies the selection
//!   policy and starts the decode loop.
//! - `stop` is idempotent and always ends `Idle`, even when the backend
//!   misbehaves (failures are logged, never propagated).
//! - `pause`/`resume` keep the device open. A failed resume falls back to a
//!   full stop+start cycle.
//! - `switch_camera` fully stops before starting the next device, so at most
//!   one device is held at any time.

use tokio::sync::mpsc;

use super::select::{next_camera_index, select_camera};
use super::{CameraBackend, CameraDescriptor, CameraError, CaptureConstraints, DecodeEvent};

/// Lifecycle state of the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    /// No device held.
    #[default]
    Idle,
    /// Device held, decode results delivered.
    Scanning,
    /// Device held, decode results suppressed.
    Paused,
}

/// How a [`CameraManager::resume`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The backend resumed the paused decode loop.
    Resumed,
    /// Resume failed and the device was restarted instead.
    Restarted,
    /// No device was held; nothing to resume.
    NotRunning,
}

/// Owns the capture backend and its decode stream.
pub struct CameraManager<B> {
    backend: B,
    constraints: CaptureConstraints,
    state: CameraState,
    cameras: Vec<CameraDescriptor>,
    current_camera_id: Option<String>,
    events: Option<mpsc::Receiver<DecodeEvent>>,
}

impl<B: CameraBackend> CameraManager<B> {
    /// Create an idle manager.
    #[must_use]
    pub fn new(backend: B, constraints: CaptureConstraints) -> Self {
        Self {
            backend,
            constraints,
            state: CameraState::Idle,
            cameras: Vec::new(),
            current_camera_id: None,
            events: None,
        }
    }

    // ==================== Accessors ====================

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Whether a device is held (scanning or paused).
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state != CameraState::Idle
    }

    /// Devices found by the most recent enumeration.
    #[must_use]
    pub fn available_cameras(&self) -> &[CameraDescriptor] {
        &self.cameras
    }

    /// Identifier of the device most recently started.
    #[must_use]
    pub fn current_camera_id(&self) -> Option<&str> {
        self.current_camera_id.as_deref()
    }

    /// Whether the backend can capture at all on this system.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    // ==================== Lifecycle ====================

    /// Start scanning on the device chosen by the selection policy.
    ///
    /// A no-op when a device is already held.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`CameraError`] when permission is denied, no
    /// device exists, the device is busy or the constraints are unsupported.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        self.start_with(None).await
    }

    /// Start scanning on `camera_id`, or on the policy's choice when `None`
    /// or when the id is no longer enumerated.
    ///
    /// # Errors
    ///
    /// See [`CameraManager::start`].
    pub async fn start_with(&mut self, camera_id: Option<&str>) -> Result<(), CameraError> {
        if self.is_scanning() {
            log::debug!("Start requested while already scanning; ignoring");
            return Ok(());
        }

        self.backend.request_permission().await?;

        let cameras = self.backend.enumerate().await?;
        if cameras.is_empty() {
            return Err(CameraError::NoCamera);
        }
        self.cameras = cameras;

        let requested = camera_id.filter(|id| self.cameras.iter().any(|c| c.id == *id));
        if requested.is_none() {
            if let Some(id) = camera_id {
                log::warn!("Camera {} is no longer available, selecting another", id);
            }
        }
        let chosen = match requested {
            Some(id) => id.to_string(),
            None => select_camera(&self.cameras)
                .map(|c| c.id.clone())
                .ok_or(CameraError::NoCamera)?,
        };

        log::debug!(
            "Starting camera {} at {} fps",
            chosen,
            self.constraints.fps
        );

        self.current_camera_id = Some(chosen.clone());
        let events = self.backend.start(&chosen, &self.constraints).await?;
        self.events = Some(events);
        self.state = CameraState::Scanning;
        log::info!("Camera {} started", chosen);
        Ok(())
    }

    /// Stop scanning and release the device.
    ///
    /// Safe to call in any state. Backend failures are logged and the
    /// manager always ends up `Idle`.
    pub async fn stop(&mut self) {
        self.events = None;
        if self.state == CameraState::Idle {
            return;
        }

        if let Err(e) = self.backend.stop().await {
            log::warn!("Error stopping scanner: {}", e);
        }
        if let Err(e) = self.backend.clear() {
            log::warn!("Error clearing scanner: {}", e);
        }

        self.state = CameraState::Idle;
        log::info!("Camera stopped");
    }

    /// Suppress decode results while keeping the device open.
    ///
    /// # Errors
    ///
    /// Returns the backend error if it could not pause.
    pub async fn pause(&mut self) -> Result<(), CameraError> {
        if self.state != CameraState::Scanning {
            return Ok(());
        }
        self.backend.pause().await?;
        self.state = CameraState::Paused;
        Ok(())
    }

    /// Re-enable decode results.
    ///
    /// If the backend refuses, the device is stopped and started again.
    ///
    /// # Errors
    ///
    /// Returns an error only if the recovery start fails; the manager is
    /// then `Idle`.
    pub async fn resume(&mut self) -> Result<ResumeOutcome, CameraError> {
        if !self.is_scanning() {
            return Ok(ResumeOutcome::NotRunning);
        }

        match self.backend.resume().await {
            Ok(()) => {
                self.state = CameraState::Scanning;
                Ok(ResumeOutcome::Resumed)
            }
            Err(e) => {
                log::warn!("Could not resume scanner: {}; restarting", e);
                let camera_id = self.current_camera_id.clone();
                self.stop().await;
                self.start_with(camera_id.as_deref()).await?;
                Ok(ResumeOutcome::Restarted)
            }
        }
    }

    /// Move to the next enumerated device, wrapping around.
    ///
    /// Returns `Ok(false)` without touching the device unless scanning with
    /// at least two devices.
    ///
    /// # Errors
    ///
    /// Returns the start error for the next device; the manager is then
    /// `Idle`.
    pub async fn switch_camera(&mut self) -> Result<bool, CameraError> {
        if !self.is_scanning() || self.cameras.len() < 2 {
            return Ok(false);
        }

        let next = next_camera_index(&self.cameras, self.current_camera_id.as_deref());
        let next_id = self.cameras[next].id.clone();
        log::info!("Switching camera to {}", next_id);

        self.stop().await;
        self.start_with(Some(&next_id)).await?;
        Ok(true)
    }

    // ==================== Decode stream ====================

    /// Wait for the next decoded payload.
    ///
    /// Decode failures are absorbed here: "no code found" frames are
    /// ignored silently, anything else is logged at debug level. Payloads
    /// arriving while paused are discarded. Without a running decode loop
    /// this never resolves, which makes it safe inside `tokio::select!`.
    pub async fn next_decoded(&mut self) -> String {
        loop {
            let Some(events) = self.events.as_mut() else {
                return std::future::pending().await;
            };

            match events.recv().await {
                Some(DecodeEvent::Decoded(payload)) => {
                    if self.state == CameraState::Paused {
                        log::trace!("Discarding code decoded while paused");
                        continue;
                    }
                    return payload;
                }
                Some(event @ DecodeEvent::Failure(_)) => report_decode_failure(&event),
                None => {
                    log::debug!("Decode loop ended");
                    self.events = None;
                }
            }
        }
    }
}

fn report_decode_failure(event: &DecodeEvent) {
    if event.is_no_code_found() {
        return;
    }
    if let DecodeEvent::Failure(msg) = event {
        log::debug!("Scan error: {}", msg);
    }
}
