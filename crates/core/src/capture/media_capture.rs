use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::capture::domain::camera_backend::{
    CameraBackend, CameraDevice, CaptureConstraints, FrameSource,
};
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::video_surface::VideoSurface;
use crate::shared::captured_frame::CapturedFrame;
use crate::shared::constants::CAPTURE_JPEG_QUALITY;

/// Opaque handle to the stream started by [`MediaCapture::start`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: u64,
}

struct ActiveStream {
    id: u64,
    stop: Arc<AtomicBool>,
    target: Arc<Mutex<Option<VideoSurface>>>,
    pump: Option<JoinHandle<()>>,
}

/// Owns the single live camera stream of the process.
///
/// Each stream gets a pump thread that pulls frames from the backend and
/// presents them on the bound [`VideoSurface`]. Starting a new stream while
/// one is live releases the old one first, so pages sharing one
/// `MediaCapture` can never hold two devices at once.
pub struct MediaCapture {
    backend: Box<dyn CameraBackend>,
    active: Mutex<Option<ActiveStream>>,
    next_id: AtomicU64,
    jpeg_quality: u8,
}

impl MediaCapture {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            jpeg_quality: CAPTURE_JPEG_QUALITY,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    pub fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        if !self.backend.is_supported() {
            return Err(CaptureError::Unsupported);
        }
        self.backend.list_devices()
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveStream>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the camera and starts pumping frames.
    pub fn start(&self, constraints: &CaptureConstraints) -> Result<StreamHandle, CaptureError> {
        if !self.backend.is_supported() {
            return Err(CaptureError::Unsupported);
        }

        let mut active = self.active();
        if let Some(previous) = active.take() {
            log::info!("Releasing camera stream {} before starting a new one", previous.id);
            release(previous);
        }

        let source = self.backend.open(constraints)?;
        let (w, h) = source.resolution();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::info!("Camera stream {id} opened at {w}x{h}");

        let stop = Arc::new(AtomicBool::new(false));
        let target = Arc::new(Mutex::new(None));
        let pump = spawn_pump(id, source, stop.clone(), target.clone());

        *active = Some(ActiveStream {
            id,
            stop,
            target,
            pump: Some(pump),
        });
        Ok(StreamHandle { id })
    }

    /// Routes the stream's frames to `surface` and waits for playback.
    pub fn bind_to_surface(
        &self,
        handle: StreamHandle,
        surface: &VideoSurface,
        timeout: Duration,
    ) -> Result<(), CaptureError> {
        {
            let active = self.active();
            let stream = active
                .as_ref()
                .filter(|s| s.id == handle.id)
                .ok_or_else(|| CaptureError::Playback("stream is no longer active".into()))?;
            surface.attach();
            *stream
                .target
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(surface.clone());
        }
        surface.wait_until_playing(timeout)
    }

    /// Encodes the surface's current frame as JPEG at native resolution.
    pub fn capture(&self, surface: &VideoSurface) -> Result<CapturedFrame, CaptureError> {
        let frame = surface.current_frame().ok_or(CaptureError::NoFrame)?;
        let name = format!("capture-{}.jpg", frame.sequence());
        CapturedFrame::encode_jpeg(&frame, self.jpeg_quality, name)
            .map_err(|e| CaptureError::Encode(e.to_string()))
    }

    /// Stops the stream if it is still the live one. Safe to repeat.
    pub fn stop(&self, handle: StreamHandle) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|s| s.id == handle.id) {
            if let Some(stream) = active.take() {
                release(stream);
                log::info!("Camera stream {} stopped", handle.id);
            }
        }
    }

    /// Stops whatever stream is live.
    pub fn stop_all(&self) {
        if let Some(stream) = self.active().take() {
            release(stream);
        }
    }

    pub fn is_active(&self, handle: StreamHandle) -> bool {
        self.active().as_ref().is_some_and(|s| s.id == handle.id)
    }

    pub fn has_active_stream(&self) -> bool {
        self.active().is_some()
    }
}

impl Drop for MediaCapture {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn release(mut stream: ActiveStream) {
    stream.stop.store(true, Ordering::Relaxed);
    if let Some(surface) = stream
        .target
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        surface.detach();
    }
    if let Some(pump) = stream.pump.take() {
        if pump.join().is_err() {
            log::warn!("Camera pump thread for stream {} panicked", stream.id);
        }
    }
}

fn spawn_pump(
    id: u64,
    mut source: Box<dyn FrameSource>,
    stop: Arc<AtomicBool>,
    target: Arc<Mutex<Option<VideoSurface>>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let next = source.next_frame();
            // Re-check after the blocking read so a released stream never
            // paints onto a surface that was already detached.
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let surface = target
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match next {
                Ok(frame) => {
                    if let Some(surface) = surface {
                        surface.present(frame);
                    }
                }
                Err(e) => {
                    log::warn!("Camera stream {id} ended: {e}");
                    if let Some(surface) = surface {
                        surface.fail(e.to_string());
                    }
                    break;
                }
            }
        }
        log::debug!("Camera pump {id} exiting");
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeCamera;
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_start_bind_capture_stop() {
        let camera = FakeCamera::new(32, 24);
        let live = camera.live.clone();
        let capture = MediaCapture::new(Box::new(camera));
        let surface = VideoSurface::new();

        let handle = capture.start(&CaptureConstraints::default()).unwrap();
        capture.bind_to_surface(handle, &surface, TIMEOUT).unwrap();
        assert!(surface.is_playing());

        let still = capture.capture(&surface).unwrap();
        assert_eq!((still.width(), still.height()), (32, 24));
        assert_eq!(still.mime_type(), "image/jpeg");
        assert!(image::load_from_memory(still.data()).is_ok());

        capture.stop(handle);
        assert!(!capture.has_active_stream());
        assert!(!surface.is_playing());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let capture = MediaCapture::new(Box::new(FakeCamera::new(8, 8)));
        let handle = capture.start(&CaptureConstraints::default()).unwrap();
        capture.stop(handle);
        capture.stop(handle);
        capture.stop_all();
        assert!(!capture.has_active_stream());
    }

    #[test]
    fn test_starting_again_releases_previous_stream() {
        let camera = FakeCamera::new(8, 8);
        let live = camera.live.clone();
        let capture = MediaCapture::new(Box::new(camera));

        let first = capture.start(&CaptureConstraints::default()).unwrap();
        let second = capture.start(&CaptureConstraints::default()).unwrap();

        assert!(!capture.is_active(first));
        assert!(capture.is_active(second));
        assert_eq!(live.load(Ordering::SeqCst), 1);

        // A stale handle must not stop the newer stream.
        capture.stop(first);
        assert!(capture.is_active(second));
    }

    #[test]
    fn test_capture_without_frame_fails() {
        let capture = MediaCapture::new(Box::new(FakeCamera::new(8, 8)));
        let surface = VideoSurface::new();
        assert_eq!(capture.capture(&surface).unwrap_err(), CaptureError::NoFrame);
    }

    #[test]
    fn test_permission_denied_is_reported() {
        let mut camera = FakeCamera::new(8, 8);
        camera.deny = true;
        let capture = MediaCapture::new(Box::new(camera));
        let err = capture.start(&CaptureConstraints::default()).unwrap_err();
        assert!(matches!(err, CaptureError::Permission(_)));
        assert!(!capture.has_active_stream());
    }

    #[test]
    fn test_unsupported_platform() {
        let mut camera = FakeCamera::new(8, 8);
        camera.supported = false;
        let capture = MediaCapture::new(Box::new(camera));
        assert_eq!(
            capture.start(&CaptureConstraints::default()).unwrap_err(),
            CaptureError::Unsupported
        );
        assert_eq!(capture.list_devices().unwrap_err(), CaptureError::Unsupported);
    }

    #[test]
    fn test_bind_with_stale_handle_fails() {
        let capture = MediaCapture::new(Box::new(FakeCamera::new(8, 8)));
        let handle = capture.start(&CaptureConstraints::default()).unwrap();
        capture.stop(handle);
        let err = capture
            .bind_to_surface(handle, &VideoSurface::new(), TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Playback(_)));
    }

    #[test]
    fn test_drop_releases_stream() {
        let camera = FakeCamera::new(8, 8);
        let live = camera.live.clone();
        {
            let capture = MediaCapture::new(Box::new(camera));
            capture.start(&CaptureConstraints::default()).unwrap();
            assert_eq!(live.load(Ordering::SeqCst), 1);
        }
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
