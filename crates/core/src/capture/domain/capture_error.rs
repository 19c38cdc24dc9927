use thiserror::Error;

/// Failures of the camera lifecycle.
///
/// `Permission` and `Unsupported` are terminal for a session; the rest can be
/// retried by the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("camera access denied: {0}")]
    Permission(String),
    #[error("no camera backend is available on this platform")]
    Unsupported,
    #[error("camera device error: {0}")]
    Device(String),
    #[error("video surface failed to start playback: {0}")]
    Playback(String),
    #[error("video surface has no current frame")]
    NoFrame,
    #[error("failed to encode captured frame: {0}")]
    Encode(String),
}
