//! Capture device selection policy.
//!
//! Mobile devices usually expose a front and a rear camera, and the rear one
//! is the one that should read codes held up by attendees. No portable API
//! reports which way a device faces, so the policy falls back on label
//! matching:
//!
//! 1. The first device whose label matches a back/rear/environment term
//!    (English, Spanish, French; case-insensitive).
//! 2. Otherwise, if there is more than one device, the last one enumerated
//!    (rear cameras tend to be listed last).
//! 3. Otherwise the first device.
//!
//! Label matching is a heuristic. Localised labels in other languages, or
//! generic labels such as "USB Camera", defeat it.

use std::sync::OnceLock;

use regex::Regex;

use super::CameraDescriptor;

fn back_camera_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)back|rear|environment|trasera|arrière").ok())
        .as_ref()
}

/// Whether a device label looks like a rear-facing camera.
#[must_use]
pub fn is_back_camera_label(label: &str) -> bool {
    back_camera_pattern().is_some_and(|re| re.is_match(label))
}

/// Pick the device to start when no explicit device was requested.
///
/// Returns `None` only when `cameras` is empty.
///
/// # Example
///
/// ```
/// use qrattend::camera::{select_camera, CameraDescriptor};
///
/// let cameras = vec![
///     CameraDescriptor::new("0", "Front"),
///     CameraDescriptor::new("1", "Back Camera"),
///     CameraDescriptor::new("2", "External"),
/// ];
/// assert_eq!(select_camera(&cameras).unwrap().id, "1");
/// ```
#[must_use]
pub fn select_camera(cameras: &[CameraDescriptor]) -> Option<&CameraDescriptor> {
    if let Some(back) = cameras.iter().find(|c| is_back_camera_label(&c.label)) {
        log::debug!("Selected camera by label: {}", back.label);
        return Some(back);
    }

    if cameras.len() > 1 {
        let last = cameras.last();
        log::debug!("No back camera label matched, using last enumerated device");
        return last;
    }

    cameras.first()
}

/// Index of the device after `current_id`, wrapping around.
///
/// An unknown or missing `current_id` yields index 0.
#[must_use]
pub fn next_camera_index(cameras: &[CameraDescriptor], current_id: Option<&str>) -> usize {
    if cameras.is_empty() {
        return 0;
    }
    let next = match current_id.and_then(|id| cameras.iter().position(|c| c.id == id)) {
        Some(idx) => idx + 1,
        None => 0,
    };
    next % cameras.len()
}
