use thiserror::Error;

use crate::shared::captured_frame::CapturedFrame;
use crate::shared::constants::DEFAULT_CONFIDENCE;
use crate::shared::detection_result::DetectionResult;
use crate::shared::server_status::ServerStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// The service answered with a non-success status.
    #[error("{message}")]
    Service { status: u16, message: String },
    /// The request never reached the service.
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response from detection service: {0}")]
    InvalidResponse(String),
}

/// Knobs sent with every detection request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    pub confidence: f64,
    pub emotions: bool,
    pub age: bool,
}

impl DetectionParams {
    pub fn with_confidence(self, confidence: f64) -> Self {
        Self { confidence, ..self }
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            emotions: false,
            age: false,
        }
    }
}

/// Remote face detection service.
///
/// Implementations are stateless request/response adapters and may be
/// called from several threads at once.
pub trait DetectionService: Send + Sync {
    fn detect(
        &self,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<DetectionResult, DetectionError>;

    /// Same request as `detect`, answered with a server-rendered image.
    fn detect_and_annotate(
        &self,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<Vec<u8>, DetectionError>;

    /// Never fails: any problem is reported as an unhealthy status.
    fn health(&self) -> ServerStatus;
}
