//! End-to-end tests of the scanner session over fake devices.

mod common;

use std::time::Duration;

use common::{harness, harness_with, options, response, FakeCamera, FakeClient};
use qrattend::camera::{CameraError, DecodeEvent};
use qrattend::client::DispatchError;
use qrattend::render::StatusLevel;
use qrattend::scanner::machine::{
    Control, Controls, Readiness, ScanEvent, ScannerState, STATUS_ACTIVE, STATUS_INSECURE,
    STATUS_READY, STATUS_STOPPED, STATUS_SWITCH_FAILED,
};
use qrattend::scanner::verdict::{EventId, ScanResponse, ScanVerdict, NETWORK_ERROR_MESSAGE};
use qrattend::signal::ShutdownHandler;
use tokio::time::Instant;

fn two_cameras() -> FakeCamera {
    FakeCamera::with_cameras(&[("front", "Front Camera"), ("back", "Back Camera")])
}

fn duplicate() -> ScanResponse {
    ScanResponse {
        student_name: Some("Ada Lovelace".into()),
        scan_time: Some("09:15".into()),
        ..response("duplicate")
    }
}

fn success() -> ScanResponse {
    ScanResponse {
        student_name: Some("Grace Hopper".into()),
        student_email: Some("grace@example.edu".into()),
        event_name: Some("Orientation".into()),
        timestamp: Some("2026-10-17 09:00:00".into()),
        ..response("success")
    }
}

#[tokio::test(start_paused = true)]
async fn test_initialize_ready() {
    let mut h = harness(two_cameras(), FakeClient::default());
    assert_eq!(h.session.initialize().await, Readiness::Ready);
    assert_eq!(
        h.view.last_status(),
        Some((STATUS_READY.to_string(), StatusLevel::Info))
    );
    assert_eq!(h.view.last_controls(), Some(Controls::READY));
    assert!(h.camera.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_insecure_endpoint_disables_scanner() {
    let mut h = harness_with(
        options("http://attendance.example.edu/api/scan-qr"),
        two_cameras(),
        FakeClient::default(),
    );
    assert_eq!(h.session.initialize().await, Readiness::InsecureContext);
    assert_eq!(h.session.state(), ScannerState::Disabled);
    assert_eq!(h.view.log().statuses[0].0, STATUS_INSECURE);
    assert_eq!(h.view.last_controls(), Some(Controls::DISABLED));

    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    assert!(h.camera.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_plain_http_to_localhost_is_allowed() {
    let mut h = harness_with(
        options("http://127.0.0.1:5000/api/scan-qr"),
        two_cameras(),
        FakeClient::default(),
    );
    assert_eq!(h.session.initialize().await, Readiness::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_backend_disables_scanner() {
    let camera = two_cameras();
    camera.state().supported = false;
    let mut h = harness(camera, FakeClient::default());
    assert_eq!(h.session.initialize().await, Readiness::Unsupported);
    assert_eq!(h.session.state(), ScannerState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn test_start_selects_back_camera() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    assert_eq!(h.session.state(), ScannerState::Scanning);
    assert!(h.session.is_scanning());
    assert_eq!(h.session.current_camera_id(), Some("back"));
    assert_eq!(h.session.available_cameras().len(), 2);
    assert_eq!(
        h.view.last_status(),
        Some((STATUS_ACTIVE.to_string(), StatusLevel::Success))
    );
    assert_eq!(h.view.last_controls(), Some(Controls::RUNNING));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_resumes_after_delay() {
    let mut h = harness(two_cameras(), FakeClient::new(vec![Ok(duplicate())]));
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-001").await;
    assert!(h.session.tick().await);
    assert!(h.session.is_processing());
    assert_eq!(h.session.state(), ScannerState::Processing);
    assert_eq!(h.camera.count("pause"), 1);
    assert_eq!(h.beeper.beeps(), 1);

    let verdict_at = Instant::now();
    assert!(h.session.tick().await);
    assert!(!h.session.is_processing());
    assert_eq!(h.session.state(), ScannerState::ResumeScheduled);
    {
        let log = h.view.log();
        let (verdict, html) = log.results.last().unwrap();
        assert!(matches!(verdict, ScanVerdict::Duplicate(_)));
        assert!(html.contains("Already Scanned"));
        assert!(html.contains("Ada Lovelace"));
        assert_eq!(log.statuses.last().unwrap().1, StatusLevel::Warning);
    }

    assert!(h.session.tick().await);
    assert!(verdict_at.elapsed() >= Duration::from_millis(2000));
    assert_eq!(h.session.state(), ScannerState::Scanning);
    assert_eq!(h.camera.count("resume"), 1);
    assert_eq!(
        h.view.last_status(),
        Some((STATUS_ACTIVE.to_string(), StatusLevel::Success))
    );

    let requests = h.client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].qr_code, "STU-001");
    assert_eq!(requests[0].event_id, EventId::Numeric(42));
}

#[tokio::test(start_paused = true)]
async fn test_success_stops_and_offers_scan_next() {
    let mut h = harness(two_cameras(), FakeClient::new(vec![Ok(success())]));
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-002").await;
    assert!(h.session.tick().await);
    assert!(h.session.tick().await);

    assert_eq!(h.session.state(), ScannerState::Stopped);
    assert!(!h.session.is_scanning());
    assert!(!h.camera.is_running());
    assert_eq!(h.view.last_controls(), Some(Controls::SCAN_NEXT));
    {
        let log = h.view.log();
        let (_, html) = log.results.last().unwrap();
        assert!(html.contains("Attendance Marked!"));
        assert!(html.contains("grace@example.edu"));
    }

    h.session.dispatch(ScanEvent::Control(Control::ScanNext)).await;
    assert_eq!(h.view.log().hidden, 1);
    assert_eq!(h.session.state(), ScannerState::Scanning);
    assert!(h.camera.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_network_error_resumes() {
    let client = FakeClient::new(vec![Err(DispatchError::Http(500))]);
    let mut h = harness(two_cameras(), client);
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-003").await;
    assert!(h.session.tick().await);
    assert!(h.session.tick().await);

    {
        let log = h.view.log();
        assert_eq!(log.results.last().unwrap().0, ScanVerdict::network_error());
        assert!(log.results.last().unwrap().1.contains(NETWORK_ERROR_MESSAGE));
        assert_eq!(
            log.statuses.last().unwrap(),
            &("✗ Network error".to_string(), StatusLevel::Error)
        );
    }
    assert_eq!(h.session.state(), ScannerState::ResumeScheduled);

    assert!(h.session.tick().await);
    assert_eq!(h.session.state(), ScannerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_codes_during_processing_are_not_submitted() {
    let client = FakeClient::new(vec![Ok(duplicate())]).with_delay(Duration::from_millis(300));
    let mut h = harness(two_cameras(), client);
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-004").await;
    assert!(h.session.tick().await);
    h.camera.emit("STU-004").await;
    h.camera.emit("STU-005").await;

    // Drains the discarded codes and then the verdict.
    assert!(h.session.tick().await);
    assert_eq!(h.session.state(), ScannerState::ResumeScheduled);
    assert_eq!(h.client.requests().len(), 1);
    assert_eq!(h.beeper.beeps(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_decode_failures_are_ignored() {
    let mut h = harness(two_cameras(), FakeClient::new(vec![Ok(duplicate())]));
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera
        .send(DecodeEvent::Failure("No QR code found".into()))
        .await;
    h.camera
        .send(DecodeEvent::Failure("frame decode error".into()))
        .await;
    h.camera.emit("STU-006").await;

    assert!(h.session.tick().await);
    assert_eq!(h.session.state(), ScannerState::Processing);
    assert!(h.view.log().results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_is_noop() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;
    let statuses = h.view.log().statuses.len();

    h.session.dispatch(ScanEvent::Control(Control::Stop)).await;
    assert!(h.camera.calls().is_empty());
    assert_eq!(h.view.log().statuses.len(), statuses);
    assert_eq!(h.session.state(), ScannerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_camera() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    h.session.dispatch(ScanEvent::Control(Control::Stop)).await;

    assert!(!h.camera.is_running());
    assert_eq!(h.session.state(), ScannerState::Idle);
    assert_eq!(
        h.view.last_status(),
        Some((STATUS_STOPPED.to_string(), StatusLevel::Info))
    );
    assert_eq!(h.view.last_controls(), Some(Controls::READY));

    h.session.dispatch(ScanEvent::Control(Control::Stop)).await;
    assert_eq!(h.camera.count("stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_request_still_shows_verdict() {
    let client = FakeClient::new(vec![Ok(duplicate())]).with_delay(Duration::from_millis(500));
    let mut h = harness(two_cameras(), client);
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-007").await;
    assert!(h.session.tick().await);
    h.session.dispatch(ScanEvent::Control(Control::Stop)).await;
    assert!(h.session.is_processing());

    // Restarting does not release the in-flight guard.
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    h.camera.emit("STU-008").await;
    assert!(h.session.tick().await);
    assert_eq!(h.client.requests().len(), 1);

    // The verdict drains eventually, then new codes are accepted.
    while h.view.log().results.is_empty() {
        assert!(h.session.tick().await);
    }
    assert!(!h.session.is_processing());
    assert_eq!(h.session.state(), ScannerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_start_without_cameras_reports_error() {
    let mut h = harness(FakeCamera::with_cameras(&[]), FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    assert_eq!(h.session.state(), ScannerState::Idle);
    assert_eq!(
        h.view.last_status(),
        Some((CameraError::NoCamera.user_message(), StatusLevel::Error))
    );
    assert_eq!(h.view.last_controls(), Some(Controls::READY));
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_reports_error() {
    let camera = two_cameras();
    camera.state().permission_error = Some(CameraError::Permission);
    let mut h = harness(camera, FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    let (message, level) = h.view.last_status().unwrap();
    assert!(message.contains("permission denied"));
    assert_eq!(level, StatusLevel::Error);
    assert!(!h.session.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_switch_camera_cycles() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    assert_eq!(h.session.current_camera_id(), Some("back"));

    h.session
        .dispatch(ScanEvent::Control(Control::SwitchCamera))
        .await;
    assert_eq!(h.session.current_camera_id(), Some("front"));
    assert_eq!(h.session.state(), ScannerState::Scanning);
    assert!(h.camera.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_failed_switch_shows_switch_status() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    h.camera.state().start_errors.push_back(CameraError::DeviceBusy);

    h.session
        .dispatch(ScanEvent::Control(Control::SwitchCamera))
        .await;

    let (message, level) = h.view.last_status().unwrap();
    assert!(message.starts_with(STATUS_SWITCH_FAILED));
    assert_eq!(level, StatusLevel::Error);
    assert_eq!(h.session.state(), ScannerState::Idle);
    assert!(!h.session.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_switch_with_single_camera_is_ignored() {
    let mut h = harness(
        FakeCamera::with_cameras(&[("only", "USB Camera")]),
        FakeClient::default(),
    );
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;
    h.camera.clear_calls();

    h.session
        .dispatch(ScanEvent::Control(Control::SwitchCamera))
        .await;
    assert!(h.camera.calls().is_empty());
    assert_eq!(h.session.state(), ScannerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resume_restarts_camera() {
    let mut h = harness(two_cameras(), FakeClient::new(vec![Ok(duplicate())]));
    h.session.initialize().await;
    h.session.dispatch(ScanEvent::Control(Control::Start)).await;

    h.camera.emit("STU-009").await;
    assert!(h.session.tick().await);
    assert!(h.session.tick().await);
    h.camera.state().resume_error = Some(CameraError::Backend("stream lost".into()));
    assert!(h.session.tick().await);

    assert_eq!(h.session.state(), ScannerState::Scanning);
    assert_eq!(h.camera.count("start:back"), 2);
    assert!(h.camera.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_control_handle_feeds_session() {
    let mut h = harness(two_cameras(), FakeClient::default());
    h.session.initialize().await;

    let controls = h.session.control_handle();
    assert!(controls.send(Control::Start));
    assert!(h.session.tick().await);
    assert!(h.session.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_run_ends_on_shutdown_and_releases_camera() {
    let shutdown = ShutdownHandler::new();
    let h = harness(two_cameras(), FakeClient::new(vec![Ok(duplicate())]));
    let camera = h.camera.clone();
    let mut session = h.session.with_shutdown(shutdown.clone());
    session.initialize().await;
    session.dispatch(ScanEvent::Control(Control::Start)).await;
    camera.emit("STU-010").await;

    let remote = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        remote.request_shutdown();
    });

    let report = session.run().await;
    assert!(report.finished_at.is_some());
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].qr_code.as_deref(), Some("STU-010"));
    assert_eq!(report.records[0].outcome, "duplicate");
    assert!(!camera.is_running());
}
