use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::capture::domain::camera_backend::CaptureConstraints;
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::video_surface::VideoSurface;
use crate::capture::media_capture::{MediaCapture, StreamHandle};
use crate::detection::domain::detection_service::{DetectionParams, DetectionService};
use crate::overlay::overlay_renderer::OverlayRenderer;
use crate::overlay::infrastructure::overlay_scene::OverlayScene;
use crate::realtime::domain::fps_counter::FpsCounter;
use crate::realtime::domain::loop_state::{ActivePhase, LoopState};
use crate::shared::captured_frame::CapturedFrame;
use crate::shared::constants::{
    CAPTURE_JPEG_QUALITY, REALTIME_DETECTION_INTERVAL, REALTIME_TARGET_FPS, SURFACE_READY_TIMEOUT,
};
use crate::shared::detection_result::DetectionResult;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoopError {
    #[error("camera: {0}")]
    Capture(#[from] CaptureError),
}

#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    pub target_fps: u32,
    /// Minimum spacing between two detection requests.
    pub detection_interval: Duration,
    /// How long `start` waits for the first camera frame.
    pub bind_timeout: Duration,
    pub constraints: CaptureConstraints,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            target_fps: REALTIME_TARGET_FPS,
            detection_interval: REALTIME_DETECTION_INTERVAL,
            bind_timeout: SURFACE_READY_TIMEOUT,
            constraints: CaptureConstraints::default(),
        }
    }
}

/// Read-only view of the loop for front ends.
#[derive(Clone, Debug)]
pub struct LoopSnapshot {
    pub state: LoopState,
    pub fps: u32,
    /// Overlay drawn on the most recent render tick.
    pub scene: OverlayScene,
    /// Faces in the most recent result, `None` before the first response.
    pub face_count: Option<usize>,
    pub last_error: Option<String>,
    pub params: DetectionParams,
}

#[derive(Default)]
struct View {
    fps: u32,
    scene: OverlayScene,
    face_count: Option<usize>,
}

/// State owned by one start/stop cycle.
///
/// `active` is only flipped while holding `result`, so a detection worker
/// that re-checks it under the same lock either lands before the session
/// ends or sees it dead and drops its response.
struct Session {
    active: AtomicBool,
    in_flight: AtomicBool,
    result: Mutex<Option<DetectionResult>>,
    last_error: Mutex<Option<String>>,
}

impl Session {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            result: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns `false` if the session had already ended.
    fn end(&self) -> bool {
        let mut result = lock(&self.result);
        let was_active = self.active.swap(false, Ordering::SeqCst);
        *result = None;
        *lock(&self.last_error) = None;
        was_active
    }
}

struct Running {
    session: Arc<Session>,
    stream: StreamHandle,
    render: Option<JoinHandle<()>>,
}

enum Slot {
    Idle,
    /// A `start` call is acquiring the camera without holding the slot
    /// lock. `stop` sets the flag and the stream is released on arrival.
    Starting(Arc<AtomicBool>),
    /// Also kept after the session ended on its own, until the next
    /// `start` or `stop` reaps it.
    Running(Running),
}

struct DetectionJob {
    frame: Arc<Frame>,
    params: DetectionParams,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Continuous capture, detect and render cycle over a live camera stream.
///
/// A render thread redraws the overlay at the target frame rate from the
/// last known result and, at most every `detection_interval`, hands the
/// current frame to a detection worker. Rendering never waits on the
/// network and only one request is outstanding at a time.
///
/// The session ends by itself when its stream fails or is taken over by
/// another `MediaCapture::start`; the reason is reported as `last_error`.
pub struct RealtimeDetectionLoop {
    capture: Arc<MediaCapture>,
    detector: Arc<dyn DetectionService>,
    surface: VideoSurface,
    config: RealtimeConfig,
    state: Arc<Mutex<LoopState>>,
    params: Arc<Mutex<DetectionParams>>,
    view: Arc<Mutex<View>>,
    ended: Arc<Mutex<Option<String>>>,
    running: Mutex<Slot>,
}

impl RealtimeDetectionLoop {
    pub fn new(
        capture: Arc<MediaCapture>,
        detector: Arc<dyn DetectionService>,
        surface: VideoSurface,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            capture,
            detector,
            surface,
            config,
            state: Arc::new(Mutex::new(LoopState::Idle)),
            params: Arc::new(Mutex::new(DetectionParams::default())),
            view: Arc::new(Mutex::new(View::default())),
            ended: Arc::new(Mutex::new(None)),
            running: Mutex::new(Slot::Idle),
        }
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    /// Acquires and binds a camera stream, then starts rendering and
    /// detecting. Does nothing if the loop is already starting or active.
    ///
    /// Only this call waits for the camera; `state`, `snapshot` and `stop`
    /// stay responsive meanwhile. A `stop` during startup makes this return
    /// `Ok` with the loop idle and the stream released.
    pub fn start(&self) -> Result<(), LoopError> {
        let cancelled = {
            let mut slot = lock(&self.running);
            match &*slot {
                Slot::Starting(_) => return Ok(()),
                Slot::Running(r) if r.session.is_active() => return Ok(()),
                _ => {}
            }
            if let Slot::Running(finished) = mem::replace(&mut *slot, Slot::Idle) {
                self.release(finished);
            }
            let cancelled = Arc::new(AtomicBool::new(false));
            *slot = Slot::Starting(cancelled.clone());
            *lock(&self.ended) = None;
            *lock(&self.state) = LoopState::Starting;
            cancelled
        };

        let acquired = self.acquire_stream();

        let mut slot = lock(&self.running);
        if cancelled.load(Ordering::SeqCst) {
            if let Ok(stream) = acquired {
                self.capture.stop(stream);
            }
            log::info!("Realtime detection start cancelled");
            return Ok(());
        }
        let stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Realtime detection could not start: {e}");
                *slot = Slot::Idle;
                *lock(&self.state) = LoopState::Idle;
                return Err(e.into());
            }
        };

        // Active before the render thread exists, so a stream lost on its
        // first tick is not overwritten.
        *lock(&self.state) = LoopState::Active(ActivePhase::Idle);
        let session = Arc::new(Session::new());
        let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectionJob>(1);
        spawn_detection_worker(session.clone(), self.detector.clone(), job_rx);
        let render = self.spawn_render(session.clone(), job_tx, stream);

        *slot = Slot::Running(Running {
            session,
            stream,
            render: Some(render),
        });
        log::info!("Realtime detection started");
        Ok(())
    }

    fn acquire_stream(&self) -> Result<StreamHandle, CaptureError> {
        let stream = self.capture.start(&self.config.constraints)?;
        if let Err(e) = self
            .capture
            .bind_to_surface(stream, &self.surface, self.config.bind_timeout)
        {
            self.capture.stop(stream);
            return Err(e);
        }
        Ok(stream)
    }

    fn release(&self, mut running: Running) {
        if let Some(render) = running.render.take() {
            if render.join().is_err() {
                log::warn!("Realtime render thread panicked");
            }
        }
        self.capture.stop(running.stream);
    }

    /// Stops rendering, releases the stream and clears the last result,
    /// error and FPS. Safe to call in any state and more than once. A
    /// response that arrives after this returns is discarded.
    pub fn stop(&self) {
        let mut slot = lock(&self.running);
        match mem::replace(&mut *slot, Slot::Idle) {
            Slot::Idle => return,
            Slot::Starting(cancelled) => {
                cancelled.store(true, Ordering::SeqCst);
                // Wakes a start blocked on the first frame.
                self.surface.detach();
            }
            Slot::Running(current) => {
                *lock(&self.state) = LoopState::Stopping;
                current.session.end();
                self.release(current);
            }
        }

        *lock(&self.view) = View::default();
        *lock(&self.ended) = None;
        *lock(&self.state) = LoopState::Idle;
        log::info!("Realtime detection stopped");
    }

    pub fn state(&self) -> LoopState {
        let state = *lock(&self.state);
        let slot = lock(&self.running);
        match (state, &*slot) {
            (LoopState::Active(_), Slot::Running(r))
                if r.session.in_flight.load(Ordering::SeqCst) =>
            {
                LoopState::Active(ActivePhase::Detecting)
            }
            _ => state,
        }
    }

    /// Parameters used by every request issued from now on.
    pub fn set_params(&self, params: DetectionParams) {
        *lock(&self.params) = params;
    }

    pub fn params(&self) -> DetectionParams {
        *lock(&self.params)
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        let state = self.state();
        let session_error = match &*lock(&self.running) {
            Slot::Running(r) if r.session.is_active() => lock(&r.session.last_error).clone(),
            _ => None,
        };
        let last_error = session_error.or_else(|| lock(&self.ended).clone());
        let view = lock(&self.view);
        LoopSnapshot {
            state,
            fps: view.fps,
            scene: view.scene.clone(),
            face_count: view.face_count,
            last_error,
            params: self.params(),
        }
    }

    fn spawn_render(
        &self,
        session: Arc<Session>,
        job_tx: Sender<DetectionJob>,
        stream: StreamHandle,
    ) -> JoinHandle<()> {
        let capture = self.capture.clone();
        let surface = self.surface.clone();
        let params = self.params.clone();
        let view = self.view.clone();
        let state = self.state.clone();
        let ended = self.ended.clone();
        let period = Duration::from_secs(1) / self.config.target_fps.max(1);
        let interval = self.config.detection_interval;

        thread::spawn(move || {
            let mut renderer = OverlayRenderer::default();
            let mut scene = OverlayScene::new();
            let mut fps = FpsCounter::new(Instant::now());
            let mut last_request: Option<Instant> = None;

            while session.is_active() {
                if let Some(reason) = stream_lost(&capture, stream, &surface) {
                    if session.end() {
                        log::warn!("Realtime detection ended: {reason}");
                        capture.stop(stream);
                        *lock(&view) = View::default();
                        *lock(&ended) = Some(reason);
                        *lock(&state) = LoopState::Idle;
                    }
                    break;
                }

                let tick = Instant::now();
                let current = params_snapshot(&params);
                renderer.set_show_emotion(current.emotions);

                let result = lock(&session.result).clone();
                renderer.render(&surface, result.as_ref(), &mut scene);
                if let Some(rate) = fps.tick(tick) {
                    log::trace!("Realtime render at {rate} fps");
                }
                {
                    let mut view = lock(&view);
                    view.fps = fps.fps();
                    view.scene = scene.clone();
                    view.face_count = result.as_ref().map(|r| r.face_count);
                }

                let due = last_request.map_or(true, |t| tick.duration_since(t) >= interval);
                if due && !session.in_flight.load(Ordering::SeqCst) {
                    if let Some(frame) = surface.current_frame() {
                        session.in_flight.store(true, Ordering::SeqCst);
                        match job_tx.try_send(DetectionJob {
                            frame,
                            params: current,
                        }) {
                            Ok(()) => last_request = Some(tick),
                            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                                session.in_flight.store(false, Ordering::SeqCst);
                            }
                        }
                    }
                }

                if let Some(rest) = period.checked_sub(tick.elapsed()) {
                    thread::sleep(rest);
                }
            }
            log::debug!("Realtime render thread exiting");
        })
    }
}

/// Why the session's stream can no longer deliver frames, if it can't.
fn stream_lost(
    capture: &MediaCapture,
    stream: StreamHandle,
    surface: &VideoSurface,
) -> Option<String> {
    if !capture.is_active(stream) {
        return Some("camera stream was released".to_string());
    }
    surface.failure().map(|reason| format!("camera stream failed: {reason}"))
}

fn params_snapshot(params: &Mutex<DetectionParams>) -> DetectionParams {
    *lock(params)
}

/// Runs detection requests one at a time until the render thread drops its
/// sender. A late completion from a stopped session is discarded.
fn spawn_detection_worker(
    session: Arc<Session>,
    detector: Arc<dyn DetectionService>,
    jobs: Receiver<DetectionJob>,
) {
    thread::spawn(move || {
        for job in jobs.iter() {
            if !session.is_active() {
                break;
            }
            let name = format!("realtime-{}.jpg", job.frame.sequence());
            let outcome = CapturedFrame::encode_jpeg(&job.frame, CAPTURE_JPEG_QUALITY, name)
                .map_err(|e| e.to_string())
                .and_then(|still| {
                    detector
                        .detect(&still, &job.params)
                        .map_err(|e| e.to_string())
                });

            {
                let mut result = lock(&session.result);
                if !session.is_active() {
                    log::debug!("Discarding detection response for a stopped session");
                    session.in_flight.store(false, Ordering::SeqCst);
                    break;
                }
                match outcome {
                    Ok(r) => {
                        log::trace!("Realtime detection: {} face(s)", r.face_count);
                        *result = Some(r);
                        *lock(&session.last_error) = None;
                    }
                    Err(e) => {
                        log::warn!("Realtime detection failed: {e}");
                        *lock(&session.last_error) = Some(e);
                    }
                }
            }
            session.in_flight.store(false, Ordering::SeqCst);
        }
        log::debug!("Realtime detection worker exiting");
    });
}

impl Drop for RealtimeDetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::media_capture::test_support::FakeCamera;
    use crate::detection::domain::detection_service::DetectionError;
    use crate::shared::detection_result::{BoundingBox, Face, ImageSize};
    use crate::shared::server_status::ServerStatus;
    use std::sync::atomic::AtomicUsize;

    struct FakeDetector {
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
        last_params: Mutex<Option<DetectionParams>>,
    }

    impl FakeDetector {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fail: false,
                calls: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                last_params: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Duration::from_millis(1))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DetectionService for FakeDetector {
        fn detect(
            &self,
            frame: &CapturedFrame,
            params: &DetectionParams,
        ) -> Result<DetectionResult, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            *self.last_params.lock().unwrap() = Some(*params);
            thread::sleep(self.delay);
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(DetectionError::Network("connection refused".into()));
            }
            let face = Face::from_bbox(
                0.9,
                BoundingBox {
                    x1: 4.0,
                    y1: 4.0,
                    x2: 12.0,
                    y2: 12.0,
                },
            );
            Ok(DetectionResult {
                processing_time: 0.01,
                original_image_size: ImageSize {
                    width: frame.width(),
                    height: frame.height(),
                },
                face_count: 1,
                faces: vec![face],
            })
        }

        fn detect_and_annotate(
            &self,
            _frame: &CapturedFrame,
            _params: &DetectionParams,
        ) -> Result<Vec<u8>, DetectionError> {
            Ok(Vec::new())
        }

        fn health(&self) -> ServerStatus {
            ServerStatus::unhealthy("fake")
        }
    }

    fn config(interval: Duration) -> RealtimeConfig {
        RealtimeConfig {
            detection_interval: interval,
            bind_timeout: Duration::from_secs(5),
            ..RealtimeConfig::default()
        }
    }

    fn make_loop(
        camera: FakeCamera,
        detector: Arc<FakeDetector>,
        interval: Duration,
    ) -> (RealtimeDetectionLoop, Arc<MediaCapture>) {
        let capture = Arc::new(MediaCapture::new(Box::new(camera)));
        let realtime = RealtimeDetectionLoop::new(
            capture.clone(),
            detector,
            VideoSurface::new(),
            config(interval),
        );
        (realtime, capture)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_start_renders_detections_and_stop_releases_everything() {
        let camera = FakeCamera::new(32, 32);
        let live = camera.live.clone();
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(5)));
        let (realtime, capture) = make_loop(camera, detector, Duration::from_millis(100));

        realtime.start().unwrap();
        assert!(realtime.state().is_active());
        assert!(wait_for(|| realtime.snapshot().face_count == Some(1)));
        assert!(wait_for(|| realtime.snapshot().scene.rects().count() == 1));

        realtime.stop();
        let snapshot = realtime.snapshot();
        assert_eq!(snapshot.state, LoopState::Idle);
        assert_eq!(snapshot.fps, 0);
        assert_eq!(snapshot.face_count, None);
        assert!(snapshot.scene.is_empty());
        assert!(!capture.has_active_stream());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_response_after_stop_is_discarded() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(300)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector.clone(), Duration::from_millis(10));

        realtime.start().unwrap();
        assert!(wait_for(|| detector.calls() >= 1));
        realtime.stop();

        thread::sleep(Duration::from_millis(500));
        let snapshot = realtime.snapshot();
        assert_eq!(snapshot.state, LoopState::Idle);
        assert_eq!(snapshot.face_count, None);
        assert!(snapshot.scene.is_empty());
    }

    #[test]
    fn test_stop_is_idempotent_and_safe_when_idle() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(8, 8), detector, Duration::from_millis(50));

        realtime.stop();
        realtime.start().unwrap();
        realtime.stop();
        realtime.stop();
        assert_eq!(realtime.state(), LoopState::Idle);
    }

    #[test]
    fn test_start_twice_keeps_single_stream() {
        let camera = FakeCamera::new(8, 8);
        let opened = camera.opened.clone();
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, _capture) = make_loop(camera, detector, Duration::from_millis(50));

        realtime.start().unwrap();
        realtime.start().unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        realtime.stop();
    }

    #[test]
    fn test_detection_error_keeps_loop_running() {
        let detector = Arc::new(FakeDetector::failing());
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector.clone(), Duration::from_millis(20));

        realtime.start().unwrap();
        assert!(wait_for(|| realtime.snapshot().last_error.is_some()));
        assert!(wait_for(|| detector.calls() >= 3));
        assert!(realtime.state().is_active());
        assert_eq!(realtime.snapshot().face_count, None);
        realtime.stop();
        assert_eq!(realtime.snapshot().last_error, None);
    }

    #[test]
    fn test_requests_are_throttled_to_interval() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector.clone(), Duration::from_millis(500));

        realtime.start().unwrap();
        thread::sleep(Duration::from_millis(1200));
        realtime.stop();

        let calls = detector.calls();
        assert!((2..=4).contains(&calls), "unexpected request count {calls}");
    }

    #[test]
    fn test_at_most_one_request_in_flight() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(200)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector.clone(), Duration::from_millis(1));

        realtime.start().unwrap();
        assert!(wait_for(|| detector.calls() >= 3));
        realtime.stop();
        assert_eq!(detector.max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fps_reported_while_active() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector, Duration::from_millis(500));

        realtime.start().unwrap();
        assert!(wait_for(|| realtime.snapshot().fps > 0));
        assert!(realtime.snapshot().fps <= 31);
        realtime.stop();
    }

    #[test]
    fn test_set_params_applies_to_next_request() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, _capture) =
            make_loop(FakeCamera::new(16, 16), detector.clone(), Duration::from_millis(20));

        realtime.set_params(DetectionParams {
            confidence: 0.3,
            emotions: true,
            age: false,
        });
        realtime.start().unwrap();
        assert!(wait_for(|| {
            detector
                .last_params
                .lock()
                .unwrap()
                .is_some_and(|p| p.confidence == 0.3 && p.emotions)
        }));
        realtime.stop();
    }

    #[test]
    fn test_failed_start_returns_to_idle() {
        let mut camera = FakeCamera::new(8, 8);
        camera.deny = true;
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, capture) = make_loop(camera, detector, Duration::from_millis(50));

        let err = realtime.start().unwrap_err();
        assert!(matches!(err, LoopError::Capture(CaptureError::Permission(_))));
        assert_eq!(realtime.state(), LoopState::Idle);
        assert!(!capture.has_active_stream());
    }

    #[test]
    fn test_snapshot_and_stop_do_not_wait_for_camera_startup() {
        let mut camera = FakeCamera::new(16, 16);
        camera.frame_delay = Duration::from_millis(1500);
        let live = camera.live.clone();
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, capture) = make_loop(camera, detector, Duration::from_millis(50));
        let realtime = Arc::new(realtime);

        let starter = {
            let realtime = realtime.clone();
            thread::spawn(move || realtime.start())
        };
        assert!(wait_for(|| realtime.state() == LoopState::Starting));
        thread::sleep(Duration::from_millis(100));

        let before = Instant::now();
        let snapshot = realtime.snapshot();
        let waited = before.elapsed();
        assert!(waited < Duration::from_millis(200), "snapshot blocked for {waited:?}");
        assert_eq!(snapshot.state, LoopState::Starting);

        let before = Instant::now();
        realtime.stop();
        let waited = before.elapsed();
        assert!(waited < Duration::from_millis(200), "stop blocked for {waited:?}");
        assert_eq!(realtime.state(), LoopState::Idle);

        assert!(starter.join().unwrap().is_ok());
        assert_eq!(realtime.state(), LoopState::Idle);
        assert!(!capture.has_active_stream());
        assert!(wait_for(|| live.load(Ordering::SeqCst) == 0));
    }

    #[test]
    fn test_loop_ends_when_another_session_takes_the_camera() {
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, capture) =
            make_loop(FakeCamera::new(16, 16), detector, Duration::from_millis(50));

        realtime.start().unwrap();
        let other = capture.start(&CaptureConstraints::default()).unwrap();
        assert!(wait_for(|| realtime.state() == LoopState::Idle));

        let snapshot = realtime.snapshot();
        assert!(snapshot
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("released")));
        assert_eq!(snapshot.face_count, None);
        assert!(capture.is_active(other));

        realtime.start().unwrap();
        assert!(realtime.state().is_active());
        assert_eq!(realtime.snapshot().last_error, None);
        realtime.stop();
    }

    #[test]
    fn test_loop_ends_when_camera_fails() {
        let mut camera = FakeCamera::new(16, 16);
        camera.fail_after = Some(10);
        let live = camera.live.clone();
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, capture) = make_loop(camera, detector, Duration::from_millis(50));

        realtime.start().unwrap();
        assert!(wait_for(|| realtime.state() == LoopState::Idle));

        let snapshot = realtime.snapshot();
        assert!(snapshot
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("device unplugged")));
        assert!(!capture.has_active_stream());
        assert!(wait_for(|| live.load(Ordering::SeqCst) == 0));

        realtime.stop();
        assert_eq!(realtime.snapshot().last_error, None);
    }

    #[test]
    fn test_drop_releases_stream() {
        let camera = FakeCamera::new(8, 8);
        let live = camera.live.clone();
        let detector = Arc::new(FakeDetector::new(Duration::from_millis(1)));
        let (realtime, capture) = make_loop(camera, detector, Duration::from_millis(50));

        realtime.start().unwrap();
        drop(realtime);
        assert!(!capture.has_active_stream());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
