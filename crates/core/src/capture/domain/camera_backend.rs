use crate::capture::domain::capture_error::CaptureError;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera.
    Environment,
}

/// Requested stream properties. Backends treat `ideal_*` as a preference
/// and `min_*` as the smallest acceptable size.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConstraints {
    pub device: Option<String>,
    pub min_width: u32,
    pub min_height: u32,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub frame_rate: u32,
    pub facing_mode: FacingMode,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            device: None,
            min_width: 640,
            min_height: 480,
            ideal_width: 1280,
            ideal_height: 720,
            frame_rate: 30,
            facing_mode: FacingMode::User,
        }
    }
}

/// A camera the backend can open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub name: String,
}

/// An open camera producing decoded frames.
///
/// Dropping the source must release the underlying device.
pub trait FrameSource: Send {
    /// Blocks until the next frame is decoded.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Native pixel size of the stream.
    fn resolution(&self) -> (u32, u32);
}

/// Platform camera API.
pub trait CameraBackend: Send + Sync {
    fn is_supported(&self) -> bool;

    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError>;

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, CaptureError>;
}
