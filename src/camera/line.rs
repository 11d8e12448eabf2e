//! Capture backend for line-oriented code readers.
//!
//! Many hardware QR readers decode on the device and emit each code as a
//! line of text over a serial/CDC port. This backend treats every configured
//! path (a tty, a FIFO or a plain file) as one capture device:
//!
//! - Each non-blank line is one decoded payload, forwarded verbatim apart
//!   from the line terminator.
//! - A blank line is a frame without a code ([`NO_CODE_FOUND`]).
//! - A line that is not valid UTF-8 is a decode failure; reading continues.
//! - Lines that arrive while paused are dropped.
//!
//! # Example
//!
//! ```
//! use qrattend::camera::LineDevice;
//!
//! let device: LineDevice = "Back reader=/dev/ttyACM0".parse().unwrap();
//! assert_eq!(device.label, "Back reader");
//! assert_eq!(device.path.to_str(), Some("/dev/ttyACM0"));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CameraBackend, CameraDescriptor, CameraError, CaptureConstraints, DecodeEvent};
use super::NO_CODE_FOUND;

/// Capacity of the decode channel between the reader task and the manager.
const DECODE_CHANNEL_CAPACITY: usize = 32;

/// Back-off after a failed read before trying again.
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A configured line device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDevice {
    /// Label used for display and for the back-camera heuristic.
    pub label: String,
    /// Path to read decoded lines from.
    pub path: PathBuf,
}

impl LineDevice {
    /// Create a new device.
    #[must_use]
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Identifier reported in the [`CameraDescriptor`].
    #[must_use]
    pub fn id(&self) -> String {
        self.path.display().to_string()
    }
}

impl fmt::Display for LineDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.label, self.path.display())
    }
}

impl FromStr for LineDevice {
    type Err = String;

    /// Parse `LABEL=PATH`, or a bare `PATH` labelled by its file name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Device cannot be empty".to_string());
        }

        match s.split_once('=') {
            Some((label, path)) => {
                let path = path.trim();
                if path.is_empty() {
                    return Err(format!("Missing device path in '{s}'"));
                }
                Ok(Self::new(label.trim(), path))
            }
            None => {
                let path = PathBuf::from(s);
                let label = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| s.to_string());
                Ok(Self { label, path })
            }
        }
    }
}

/// Running reader task for the active device.
struct ActiveCapture {
    task: JoinHandle<()>,
    paused: Arc<AtomicBool>,
}

/// [`CameraBackend`] over line-emitting devices.
pub struct LineCamera {
    devices: Vec<LineDevice>,
    active: Option<ActiveCapture>,
}

impl LineCamera {
    /// Create a backend over the given devices, in enumeration order.
    #[must_use]
    pub fn new(devices: Vec<LineDevice>) -> Self {
        Self {
            devices,
            active: None,
        }
    }

    /// Configured devices, whether or not they currently exist.
    #[must_use]
    pub fn devices(&self) -> &[LineDevice] {
        &self.devices
    }

    fn active(&self) -> Result<&ActiveCapture, CameraError> {
        self.active
            .as_ref()
            .ok_or_else(|| CameraError::Backend("scanner is not running".to_string()))
    }
}

impl Drop for LineCamera {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

#[async_trait]
impl CameraBackend for LineCamera {
    async fn request_permission(&mut self) -> Result<(), CameraError> {
        let mut denied = 0usize;
        for device in &self.devices {
            match tokio::fs::metadata(&device.path).await {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => denied += 1,
                Err(e) => log::debug!("Device {} unavailable: {}", device, e),
            }
        }

        if denied > 0 {
            Err(CameraError::Permission)
        } else {
            // Nothing reachable; enumeration reports the missing devices.
            Ok(())
        }
    }

    async fn enumerate(&mut self) -> Result<Vec<CameraDescriptor>, CameraError> {
        let mut found = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            match tokio::fs::metadata(&device.path).await {
                Ok(_) => found.push(CameraDescriptor::new(device.id(), device.label.clone())),
                Err(e) => log::debug!("Skipping device {}: {}", device, e),
            }
        }
        Ok(found)
    }

    async fn start(
        &mut self,
        camera_id: &str,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<DecodeEvent>, CameraError> {
        if self.active.is_some() {
            return Err(CameraError::Backend(
                "scanner is already running".to_string(),
            ));
        }
        constraints.validate()?;

        let device = self
            .devices
            .iter()
            .find(|d| d.id() == camera_id)
            .ok_or(CameraError::NoCamera)?;

        let metadata = tokio::fs::metadata(&device.path)
            .await
            .map_err(|e| CameraError::from_io(&e))?;
        if metadata.is_dir() {
            return Err(CameraError::Constraint(format!(
                "{} is a directory",
                device.path.display()
            )));
        }

        let file = tokio::fs::File::open(&device.path)
            .await
            .map_err(|e| CameraError::from_io(&e))?;

        log::info!("Reading codes from {}", device);

        let (tx, rx) = mpsc::channel(DECODE_CHANNEL_CAPACITY);
        let paused = Arc::new(AtomicBool::new(false));
        let task_paused = Arc::clone(&paused);
        let label = device.label.clone();

        let task = tokio::spawn(async move {
            let mut reader = BufReader::new(file);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        log::debug!("[{}] end of input", label);
                        break;
                    }
                    Ok(_) => {
                        // Noisy serial links emit stray bytes.
                        let line = String::from_utf8_lossy(&buf);
                        let payload = line.trim_end_matches(['\n', '\r']);
                        let event = if payload.trim().is_empty() {
                            DecodeEvent::Failure(NO_CODE_FOUND.to_string())
                        } else if payload.contains(char::REPLACEMENT_CHARACTER) {
                            DecodeEvent::Failure(format!("undecodable line: {}", payload))
                        } else if task_paused.load(Ordering::SeqCst) {
                            log::trace!("[{}] dropped code while paused", label);
                            continue;
                        } else {
                            DecodeEvent::Decoded(payload.to_string())
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::debug!("[{}] read error: {}", label, e);
                        if tx.send(DecodeEvent::Failure(e.to_string())).await.is_err() {
                            break;
                        }
                        if e.kind() != std::io::ErrorKind::Interrupted {
                            tokio::time::sleep(READ_RETRY_DELAY).await;
                        }
                    }
                }
            }
        });

        self.active = Some(ActiveCapture { task, paused });
        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), CameraError> {
        self.active()?.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CameraError> {
        let active = self.active()?;
        if !active.paused.swap(false, Ordering::SeqCst) {
            return Err(CameraError::NotPaused);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        let active = self
            .active
            .take()
            .ok_or_else(|| CameraError::Backend("scanner is not running".to_string()))?;
        active.task.abort();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CameraError> {
        // Line devices render no preview.
        Ok(())
    }
}
