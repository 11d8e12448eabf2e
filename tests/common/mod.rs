//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qrattend::audio::Beeper;
use qrattend::camera::{CameraBackend, CameraDescriptor, CameraError, CaptureConstraints, DecodeEvent};
use qrattend::client::{DispatchError, VerdictClient};
use qrattend::render::StatusLevel;
use qrattend::scanner::machine::Controls;
use qrattend::scanner::session::{ScannerSession, SessionOptions};
use qrattend::scanner::verdict::{EventId, ScanRequest, ScanResponse, ScanVerdict};
use qrattend::view::ScannerView;
use reqwest::Url;
use tokio::sync::mpsc;

// ==================== Camera ====================

#[derive(Default)]
pub struct FakeCameraState {
    pub calls: Vec<String>,
    pub cameras: Vec<CameraDescriptor>,
    pub supported: bool,
    pub permission_error: Option<CameraError>,
    pub start_errors: VecDeque<CameraError>,
    pub resume_error: Option<CameraError>,
    pub running: bool,
    pub paused: bool,
    pub sender: Option<mpsc::Sender<DecodeEvent>>,
}

/// Scripted capture backend. Clones share state with the test.
#[derive(Clone)]
pub struct FakeCamera {
    state: Arc<Mutex<FakeCameraState>>,
}

impl FakeCamera {
    /// Backend enumerating `(id, label)` pairs in order.
    pub fn with_cameras(cameras: &[(&str, &str)]) -> Self {
        let state = FakeCameraState {
            cameras: cameras
                .iter()
                .map(|(id, label)| CameraDescriptor::new(*id, *label))
                .collect(),
            supported: true,
            ..FakeCameraState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeCameraState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Feed a decoded payload into the running decode loop.
    pub async fn emit(&self, payload: &str) {
        self.send(DecodeEvent::Decoded(payload.to_string())).await;
    }

    pub async fn send(&self, event: DecodeEvent) {
        let sender = self.state().sender.clone().expect("camera not running");
        sender.send(event).await.expect("decode channel closed");
    }
}

#[async_trait]
impl CameraBackend for FakeCamera {
    fn is_supported(&self) -> bool {
        self.state().supported
    }

    async fn request_permission(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        state.calls.push("permission".into());
        state.permission_error.clone().map_or(Ok(()), Err)
    }

    async fn enumerate(&mut self) -> Result<Vec<CameraDescriptor>, CameraError> {
        let mut state = self.state();
        state.calls.push("enumerate".into());
        Ok(state.cameras.clone())
    }

    async fn start(
        &mut self,
        camera_id: &str,
        _constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<DecodeEvent>, CameraError> {
        let mut state = self.state();
        state.calls.push(format!("start:{camera_id}"));
        if let Some(err) = state.start_errors.pop_front() {
            return Err(err);
        }
        if state.running {
            return Err(CameraError::DeviceBusy);
        }
        let (tx, rx) = mpsc::channel(16);
        state.sender = Some(tx);
        state.running = true;
        state.paused = false;
        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        state.calls.push("pause".into());
        state.paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        state.calls.push("resume".into());
        if let Some(err) = state.resume_error.take() {
            return Err(err);
        }
        if !state.paused {
            return Err(CameraError::NotPaused);
        }
        state.paused = false;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        state.calls.push("stop".into());
        state.running = false;
        state.sender = None;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CameraError> {
        self.state().calls.push("clear".into());
        Ok(())
    }
}

// ==================== Client ====================

/// Scripted verdict client recording every request.
#[derive(Default)]
pub struct FakeClient {
    responses: Mutex<VecDeque<Result<ScanResponse, DispatchError>>>,
    requests: Mutex<Vec<ScanRequest>>,
    delay: Option<Duration>,
}

impl FakeClient {
    pub fn new(responses: Vec<Result<ScanResponse, DispatchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Answer every request only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ScanRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerdictClient for FakeClient {
    async fn submit(&self, request: &ScanRequest) -> Result<ScanResponse, DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::Network("no response scripted".into())))
    }
}

pub fn response(status: &str) -> ScanResponse {
    ScanResponse {
        status: status.to_string(),
        ..ScanResponse::default()
    }
}

// ==================== View ====================

#[derive(Debug, Default)]
pub struct ViewLog {
    pub statuses: Vec<(String, StatusLevel)>,
    pub results: Vec<(ScanVerdict, String)>,
    pub hidden: usize,
    pub controls: Vec<Controls>,
}

/// View recording everything it is asked to show.
#[derive(Clone, Default)]
pub struct RecordingView {
    log: Arc<Mutex<ViewLog>>,
}

impl RecordingView {
    pub fn log(&self) -> std::sync::MutexGuard<'_, ViewLog> {
        self.log.lock().unwrap()
    }

    pub fn last_status(&self) -> Option<(String, StatusLevel)> {
        self.log().statuses.last().cloned()
    }

    pub fn last_controls(&self) -> Option<Controls> {
        self.log().controls.last().copied()
    }
}

impl ScannerView for RecordingView {
    fn set_status(&mut self, message: &str, level: StatusLevel) {
        self.log().statuses.push((message.to_string(), level));
    }

    fn show_result(&mut self, verdict: &ScanVerdict, html: &str) {
        self.log().results.push((verdict.clone(), html.to_string()));
    }

    fn hide_result(&mut self) {
        self.log().hidden += 1;
    }

    fn set_controls(&mut self, controls: Controls) {
        self.log().controls.push(controls);
    }
}

// ==================== Beeper ====================

#[derive(Clone, Default)]
pub struct CountingBeeper {
    pub count: Arc<AtomicUsize>,
}

impl CountingBeeper {
    pub fn beeps(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Beeper for CountingBeeper {
    fn beep(&mut self) -> io::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==================== Session ====================

pub const TEST_ENDPOINT: &str = "https://localhost:5000/api/scan-qr";

pub fn options(endpoint: &str) -> SessionOptions {
    SessionOptions::new(EventId::Numeric(42), Url::parse(endpoint).unwrap())
}

pub struct Harness {
    pub session: ScannerSession<FakeCamera, RecordingView>,
    pub camera: FakeCamera,
    pub client: Arc<FakeClient>,
    pub view: RecordingView,
    pub beeper: CountingBeeper,
}

pub fn harness(camera: FakeCamera, client: FakeClient) -> Harness {
    harness_with(options(TEST_ENDPOINT), camera, client)
}

pub fn harness_with(options: SessionOptions, camera: FakeCamera, client: FakeClient) -> Harness {
    let client = Arc::new(client);
    let view = RecordingView::default();
    let beeper = CountingBeeper::default();
    let session = ScannerSession::new(
        options,
        camera.clone(),
        client.clone(),
        view.clone(),
        Box::new(beeper.clone()),
    );
    Harness {
        session,
        camera,
        client,
        view,
        beeper,
    }
}
