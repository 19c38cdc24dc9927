use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::capture::domain::capture_error::CaptureError;
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
enum Playback {
    Detached,
    /// Stream attached, waiting for the first frame.
    Loading,
    Playing,
    Failed(String),
}

struct SurfaceState {
    playback: Playback,
    frame: Option<Arc<Frame>>,
    display_size: Option<(f32, f32)>,
}

struct SurfaceInner {
    state: Mutex<SurfaceState>,
    changed: Condvar,
}

/// Display target for a live camera stream.
///
/// Holds the most recent decoded frame (native pixel size) and the size the
/// frame is shown at on screen. Cloning yields another handle to the same
/// surface, so the stream pump, the render cycle and the GUI share one view.
#[derive(Clone)]
pub struct VideoSurface {
    inner: Arc<SurfaceInner>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                state: Mutex::new(SurfaceState {
                    playback: Playback::Detached,
                    frame: None,
                    display_size: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a stream as attached; playback starts with the first frame.
    pub fn attach(&self) {
        let mut state = self.state();
        state.playback = Playback::Loading;
        state.frame = None;
        self.inner.changed.notify_all();
    }

    /// Publishes a decoded frame. Ignored while detached.
    pub fn present(&self, frame: Frame) {
        let mut state = self.state();
        match state.playback {
            Playback::Detached | Playback::Failed(_) => return,
            Playback::Loading => state.playback = Playback::Playing,
            Playback::Playing => {}
        }
        state.frame = Some(Arc::new(frame));
        self.inner.changed.notify_all();
    }

    /// Records a stream failure; waiters are woken with a playback error.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state();
        if state.playback != Playback::Detached {
            state.playback = Playback::Failed(reason.into());
            self.inner.changed.notify_all();
        }
    }

    pub fn detach(&self) {
        let mut state = self.state();
        state.playback = Playback::Detached;
        state.frame = None;
        self.inner.changed.notify_all();
    }

    /// Blocks until the first frame arrives (frame size known, playback
    /// running), the stream fails, or `timeout` elapses.
    pub fn wait_until_playing(&self, timeout: Duration) -> Result<(), CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            match &state.playback {
                Playback::Playing => return Ok(()),
                Playback::Failed(reason) => return Err(CaptureError::Playback(reason.clone())),
                Playback::Detached => {
                    return Err(CaptureError::Playback("no stream attached".to_string()))
                }
                Playback::Loading => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CaptureError::Playback(format!(
                    "no frame within {}ms",
                    timeout.as_millis()
                )));
            }
            let (guard, _) = self
                .inner
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Reason the attached stream failed, if it did.
    pub fn failure(&self) -> Option<String> {
        match &self.state().playback {
            Playback::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().playback == Playback::Playing
    }

    /// The frame currently on display, if playback is running.
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        let state = self.state();
        match state.playback {
            Playback::Playing => state.frame.clone(),
            _ => None,
        }
    }

    pub fn native_size(&self) -> Option<(u32, u32)> {
        self.current_frame().map(|f| (f.width(), f.height()))
    }

    /// Sets the on-screen size the surface is laid out at.
    pub fn set_display_size(&self, width: f32, height: f32) {
        self.state().display_size = Some((width, height));
    }

    /// On-screen size; falls back to the native size when no layout is known.
    pub fn display_size(&self) -> Option<(f32, f32)> {
        let state = self.state();
        state.display_size.or_else(|| {
            state
                .frame
                .as_ref()
                .map(|f| (f.width() as f32, f.height() as f32))
        })
    }
}

impl Default for VideoSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(seq: u64) -> Frame {
        Frame::new(vec![0u8; 4 * 2 * 3], 4, 2, seq)
    }

    #[test]
    fn test_detached_surface_ignores_frames() {
        let surface = VideoSurface::new();
        surface.present(frame(0));
        assert!(surface.current_frame().is_none());
        assert!(!surface.is_playing());
    }

    #[test]
    fn test_first_frame_starts_playback() {
        let surface = VideoSurface::new();
        surface.attach();
        assert!(!surface.is_playing());
        surface.present(frame(7));
        assert!(surface.is_playing());
        assert_eq!(surface.current_frame().unwrap().sequence(), 7);
        assert_eq!(surface.native_size(), Some((4, 2)));
    }

    #[test]
    fn test_wait_until_playing_wakes_on_frame_from_other_thread() {
        let surface = VideoSurface::new();
        surface.attach();
        let pump = surface.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            pump.present(frame(1));
        });
        surface.wait_until_playing(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_until_playing_times_out() {
        let surface = VideoSurface::new();
        surface.attach();
        let err = surface
            .wait_until_playing(Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Playback(_)));
    }

    #[test]
    fn test_failure_is_reported_to_waiter() {
        let surface = VideoSurface::new();
        surface.attach();
        surface.fail("device unplugged");
        let err = surface.wait_until_playing(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, CaptureError::Playback("device unplugged".into()));
        assert_eq!(surface.failure().as_deref(), Some("device unplugged"));

        surface.attach();
        assert_eq!(surface.failure(), None);
    }

    #[test]
    fn test_detach_clears_frame() {
        let surface = VideoSurface::new();
        surface.attach();
        surface.present(frame(0));
        surface.detach();
        assert!(surface.current_frame().is_none());
        assert!(surface.native_size().is_none());
    }

    #[test]
    fn test_display_size_defaults_to_native() {
        let surface = VideoSurface::new();
        surface.attach();
        surface.present(frame(0));
        assert_eq!(surface.display_size(), Some((4.0, 2.0)));
        surface.set_display_size(800.0, 400.0);
        assert_eq!(surface.display_size(), Some((800.0, 400.0)));
    }
}
