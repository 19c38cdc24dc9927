use std::sync::Arc;

use crate::capture::domain::video_surface::VideoSurface;
use crate::capture::media_capture::MediaCapture;
use crate::detection::domain::detection_service::{DetectionParams, DetectionService};
use crate::pipeline::detect_with_escalation_use_case::{
    DetectWithEscalationUseCase, EscalatedDetection,
};
use crate::shared::captured_frame::CapturedFrame;

/// Outcome of the camera page's "capture and detect" action.
pub struct CaptureAndDetectOutcome {
    pub still: CapturedFrame,
    pub detection: EscalatedDetection,
    /// Server-annotated image; `None` when no faces were found or the
    /// annotation request failed.
    pub annotated: Option<Vec<u8>>,
}

/// Captures a still from the live surface, detects with confidence
/// escalation, and fetches an annotated image at the confidence that
/// found faces.
pub struct CaptureAndDetectUseCase {
    capture: Arc<MediaCapture>,
    detector: Arc<dyn DetectionService>,
    escalation: DetectWithEscalationUseCase,
}

impl CaptureAndDetectUseCase {
    pub fn new(
        capture: Arc<MediaCapture>,
        detector: Arc<dyn DetectionService>,
        escalation: DetectWithEscalationUseCase,
    ) -> Self {
        Self {
            capture,
            detector,
            escalation,
        }
    }

    pub fn execute(
        &self,
        surface: &VideoSurface,
        params: &DetectionParams,
    ) -> Result<CaptureAndDetectOutcome, Box<dyn std::error::Error>> {
        let still = self.capture.capture(surface)?;
        log::info!(
            "Captured {}x{} still ({} bytes)",
            still.width(),
            still.height(),
            still.data().len()
        );

        let detection = self.escalation.execute(&still, params)?;

        let annotated = if detection.result.has_faces() {
            let annotate_params = params.with_confidence(detection.confidence());
            match self.detector.detect_and_annotate(&still, &annotate_params) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!("Annotated image unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(CaptureAndDetectOutcome {
            still,
            detection,
            annotated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::camera_backend::CaptureConstraints;
    use crate::capture::media_capture::test_support::FakeCamera;
    use crate::pipeline::detect_with_escalation_use_case::test_support::ThresholdDetector;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn live_surface(capture: &MediaCapture) -> VideoSurface {
        let surface = VideoSurface::new();
        let handle = capture.start(&CaptureConstraints::default()).unwrap();
        capture
            .bind_to_surface(handle, &surface, Duration::from_secs(5))
            .unwrap();
        surface
    }

    fn use_case(
        capture: Arc<MediaCapture>,
        detector: Arc<ThresholdDetector>,
    ) -> CaptureAndDetectUseCase {
        let escalation =
            DetectWithEscalationUseCase::new(detector.clone()).with_retry_delay(Duration::ZERO);
        CaptureAndDetectUseCase::new(capture, detector, escalation)
    }

    #[test]
    fn test_annotates_at_escalated_confidence() {
        let capture = Arc::new(MediaCapture::new(Box::new(FakeCamera::new(24, 16))));
        let surface = live_surface(&capture);
        let detector = Arc::new(ThresholdDetector::new(Some(0.3)));

        let outcome = use_case(capture.clone(), detector.clone())
            .execute(&surface, &DetectionParams::default())
            .unwrap();

        assert_eq!((outcome.still.width(), outcome.still.height()), (24, 16));
        assert_relative_eq!(outcome.detection.confidence(), 0.3);
        assert_eq!(outcome.annotated, Some(vec![1, 2, 3]));
        assert_eq!(*detector.annotated_at.lock().unwrap(), Some(0.3));
        capture.stop_all();
    }

    #[test]
    fn test_no_faces_skips_annotation() {
        let capture = Arc::new(MediaCapture::new(Box::new(FakeCamera::new(8, 8))));
        let surface = live_surface(&capture);
        let detector = Arc::new(ThresholdDetector::new(None));

        let outcome = use_case(capture.clone(), detector.clone())
            .execute(&surface, &DetectionParams::default())
            .unwrap();

        assert_eq!(outcome.detection.result.face_count, 0);
        assert!(outcome.annotated.is_none());
        assert!(detector.annotated_at.lock().unwrap().is_none());
        capture.stop_all();
    }

    #[test]
    fn test_annotation_failure_is_not_fatal() {
        let capture = Arc::new(MediaCapture::new(Box::new(FakeCamera::new(8, 8))));
        let surface = live_surface(&capture);
        let mut detector = ThresholdDetector::new(Some(0.5));
        detector.fail_annotate = true;

        let outcome = use_case(capture.clone(), Arc::new(detector))
            .execute(&surface, &DetectionParams::default())
            .unwrap();

        assert_eq!(outcome.detection.result.face_count, 1);
        assert!(outcome.annotated.is_none());
        capture.stop_all();
    }

    #[test]
    fn test_capture_without_stream_fails() {
        let capture = Arc::new(MediaCapture::new(Box::new(FakeCamera::new(8, 8))));
        let detector = Arc::new(ThresholdDetector::new(Some(0.5)));
        let result =
            use_case(capture, detector).execute(&VideoSurface::new(), &DetectionParams::default());
        assert!(result.is_err());
    }
}
