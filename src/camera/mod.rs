//! Capture device abstraction.
//!
//! This module wraps the decode-capable capture device behind a narrow
//! capability trait so the scanner workflow can be driven by real hardware
//! or by a scripted fake in tests.
//!
//! # Architecture
//!
//! * [`CameraBackend`]: The capability interface (permission, enumeration,
//!   start/pause/resume/stop of the decode loop).
//! * [`manager`]: The camera session manager. Owns a backend and enforces
//!   the lifecycle rules (idempotent stop, resume recovery, switching).
//! * [`select`]: Device selection policy (back-camera heuristic).
//! * [`line`]: A backend for readers that emit decoded codes as text lines
//!   (serial/CDC scanners, FIFOs, files).
//!
//! # Example
//!
//! ```
//! use qrattend::camera::CaptureConstraints;
//!
//! let constraints = CaptureConstraints::default();
//! let qrbox = constraints.qrbox(640, 480);
//! assert_eq!(qrbox.width, 336);
//! assert_eq!(qrbox.width, qrbox.height);
//! ```

pub mod line;
pub mod manager;
pub mod select;

use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use line::{LineCamera, LineDevice};
pub use manager::{CameraManager, CameraState, ResumeOutcome};
pub use select::{next_camera_index, select_camera};

/// Marker the decode loop uses for frames that simply contain no code.
pub const NO_CODE_FOUND: &str = "No QR code found";

/// Errors reported by a capture backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The user (or the OS) denied access to the capture device.
    #[error("camera permission denied")]
    Permission,

    /// Enumeration returned no usable device.
    #[error("no camera found")]
    NoCamera,

    /// The device is held by another process.
    #[error("camera is busy")]
    DeviceBusy,

    /// Requested capture parameters are not supported by the device.
    #[error("unsupported capture constraints: {0}")]
    Constraint(String),

    /// `resume()` was called on a device that is not paused.
    #[error("cannot resume, scanner is not paused")]
    NotPaused,

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

impl CameraError {
    /// Actionable status message shown to the user when a start attempt fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Permission => {
                "Camera permission denied. Please allow camera access and try again.".to_string()
            }
            Self::NoCamera => "No camera found. Please connect a camera and try again.".to_string(),
            Self::DeviceBusy => "Camera is in use by another application. \
                Please close other apps using the camera."
                .to_string(),
            Self::Constraint(_) => {
                "Camera does not meet requirements. Please try a different camera.".to_string()
            }
            Self::NotPaused => "Failed to start camera".to_string(),
            Self::Backend(msg) if !msg.trim().is_empty() => msg.clone(),
            Self::Backend(_) => "Failed to start camera".to_string(),
        }
    }

    /// Map an I/O error from opening a device into the capture taxonomy.
    #[must_use]
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::Permission,
            io::ErrorKind::NotFound => Self::NoCamera,
            io::ErrorKind::ResourceBusy => Self::DeviceBusy,
            io::ErrorKind::IsADirectory | io::ErrorKind::InvalidInput => {
                Self::Constraint(err.to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// A capture device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Backend-specific identifier used to start the device.
    pub id: String,
    /// Human-readable, locale-dependent label.
    pub label: String,
}

impl CameraDescriptor {
    /// Create a new descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Square scan region inside the viewfinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrBox {
    pub width: u32,
    pub height: u32,
}

/// Parameters handed to the backend when the decode loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConstraints {
    /// Decode attempts per second.
    pub fps: u32,
    /// Viewfinder aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Whether mirrored codes may be decoded.
    pub disable_flip: bool,
    /// Percentage of the smaller viewfinder edge used for the scan region.
    pub qrbox_percent: u32,
    /// Lower bound for each side of the scan region.
    pub qrbox_min: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            fps: 10,
            aspect_ratio: 1.0,
            disable_flip: false,
            qrbox_percent: 70,
            qrbox_min: 200,
        }
    }
}

impl CaptureConstraints {
    /// Override the decode rate.
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Compute the scan region for a viewfinder of the given size.
    ///
    /// The region is a square of `qrbox_percent` of the smaller edge,
    /// never smaller than `qrbox_min` per side.
    #[must_use]
    pub fn qrbox(&self, viewfinder_width: u32, viewfinder_height: u32) -> QrBox {
        let min_edge = u64::from(viewfinder_width.min(viewfinder_height));
        let size =
            u32::try_from(min_edge * u64::from(self.qrbox_percent) / 100).unwrap_or(u32::MAX);
        let side = size.max(self.qrbox_min);
        QrBox {
            width: side,
            height: side,
        }
    }

    /// Check that the constraints are satisfiable at all.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::Constraint`] for a zero frame rate or a
    /// non-positive aspect ratio.
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.fps == 0 {
            return Err(CameraError::Constraint("fps must be at least 1".into()));
        }
        if !(self.aspect_ratio > 0.0) {
            return Err(CameraError::Constraint(
                "aspect ratio must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One callback from the decode loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A QR code was decoded; the payload is opaque.
    Decoded(String),
    /// A frame could not be decoded. Includes the transient
    /// [`NO_CODE_FOUND`] signal.
    Failure(String),
}

impl DecodeEvent {
    /// Whether this is the transient "nothing in frame" signal.
    #[must_use]
    pub fn is_no_code_found(&self) -> bool {
        matches!(self, Self::Failure(msg) if msg.contains(NO_CODE_FOUND))
    }
}

/// Capability interface over a decode-capable capture device.
///
/// Implementations deliver decode results through the channel returned by
/// [`CameraBackend::start`]. While paused, no [`DecodeEvent::Decoded`]
/// values are delivered.
#[async_trait]
pub trait CameraBackend: Send {
    /// Whether capture is available on this system at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Ask for access to capture devices.
    async fn request_permission(&mut self) -> Result<(), CameraError>;

    /// List available devices in enumeration order.
    async fn enumerate(&mut self) -> Result<Vec<CameraDescriptor>, CameraError>;

    /// Start the decode loop on `camera_id`.
    async fn start(
        &mut self,
        camera_id: &str,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<DecodeEvent>, CameraError>;

    /// Halt decode delivery, keeping the device open.
    async fn pause(&mut self) -> Result<(), CameraError>;

    /// Re-enable decode delivery after [`CameraBackend::pause`].
    async fn resume(&mut self) -> Result<(), CameraError>;

    /// Stop the decode loop and release the device.
    async fn stop(&mut self) -> Result<(), CameraError>;

    /// Clear any rendered preview.
    fn clear(&mut self) -> Result<(), CameraError>;
}
