use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::detection::domain::confidence_escalation::{self, ConfidenceState};
use crate::detection::domain::detection_service::{DetectionParams, DetectionService};
use crate::shared::captured_frame::CapturedFrame;
use crate::shared::constants::ESCALATION_RETRY_DELAY;
use crate::shared::detection_result::DetectionResult;

/// Result of an escalated detect cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct EscalatedDetection {
    pub result: DetectionResult,
    /// Confidence and attempt count the accepted result was produced at.
    pub state: ConfidenceState,
}

impl EscalatedDetection {
    pub fn confidence(&self) -> f64 {
        self.state.current
    }
}

/// Detects faces in one still, walking the confidence ladder while the
/// service finds nothing.
///
/// Each cycle starts again from the default confidence. Emotion and age
/// flags from the caller's params are kept on every attempt.
pub struct DetectWithEscalationUseCase {
    detector: Arc<dyn DetectionService>,
    retry_delay: Duration,
    on_attempt: Option<Box<dyn Fn(u32, f64) -> bool + Send + Sync>>,
}

impl DetectWithEscalationUseCase {
    pub fn new(detector: Arc<dyn DetectionService>) -> Self {
        Self {
            detector,
            retry_delay: ESCALATION_RETRY_DELAY,
            on_attempt: None,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Called as `(attempt, confidence)` before each request; returning
    /// `false` cancels the cycle.
    pub fn with_progress(mut self, callback: Box<dyn Fn(u32, f64) -> bool + Send + Sync>) -> Self {
        self.on_attempt = Some(callback);
        self
    }

    pub fn execute(
        &self,
        frame: &CapturedFrame,
        params: &DetectionParams,
    ) -> Result<EscalatedDetection, Box<dyn std::error::Error>> {
        let mut state = ConfidenceState::default();
        loop {
            self.report_attempt(state)?;
            let result = self
                .detector
                .detect(frame, &params.with_confidence(state.current))?;
            log::debug!(
                "Escalation attempt {} at confidence {:.1}: {} face(s)",
                state.attempt,
                state.current,
                result.face_count
            );

            let step = confidence_escalation::next(state, result.face_count);
            if step.done {
                if result.face_count == 0 {
                    log::info!("No faces found after {} attempts", step.state.attempt);
                }
                return Ok(EscalatedDetection {
                    result,
                    state: step.state,
                });
            }
            state = step.state;
            thread::sleep(self.retry_delay);
        }
    }

    fn report_attempt(&self, state: ConfidenceState) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref callback) = self.on_attempt {
            if !callback(state.attempt, state.current) {
                return Err("Cancelled".into());
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ThresholdDetector;
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn frame() -> CapturedFrame {
        CapturedFrame::new(vec![0u8; 4], 10, 10, "image/jpeg", "still.jpg")
    }

    fn use_case(detector: Arc<ThresholdDetector>) -> DetectWithEscalationUseCase {
        DetectWithEscalationUseCase::new(detector).with_retry_delay(Duration::ZERO)
    }

    #[test]
    fn test_faces_at_default_confidence_need_one_request() {
        let detector = Arc::new(ThresholdDetector::new(Some(0.5)));
        let outcome = use_case(detector.clone())
            .execute(&frame(), &DetectionParams::default())
            .unwrap();
        assert_eq!(detector.requested(), vec![0.5]);
        assert_eq!(outcome.result.face_count, 1);
        assert_relative_eq!(outcome.confidence(), 0.5);
    }

    #[test]
    fn test_escalates_until_faces_found() {
        let detector = Arc::new(ThresholdDetector::new(Some(0.2)));
        let outcome = use_case(detector.clone())
            .execute(&frame(), &DetectionParams::default())
            .unwrap();
        assert_eq!(detector.requested(), vec![0.5, 0.3, 0.2]);
        assert_relative_eq!(outcome.confidence(), 0.2);
        assert_eq!(outcome.state.attempt, 2);
    }

    #[test]
    fn test_gives_up_after_full_ladder() {
        let detector = Arc::new(ThresholdDetector::new(None));
        let outcome = use_case(detector.clone())
            .execute(&frame(), &DetectionParams::default())
            .unwrap();
        assert_eq!(detector.requested(), vec![0.5, 0.3, 0.2, 0.1, 0.7]);
        assert_eq!(outcome.result.face_count, 0);
        assert_relative_eq!(outcome.confidence(), 0.7);
    }

    #[test]
    fn test_progress_callback_sees_each_attempt_and_can_cancel() {
        let detector = Arc::new(ThresholdDetector::new(None));
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let err = use_case(detector.clone())
            .with_progress(Box::new(move |attempt, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                attempt < 2
            }))
            .execute(&frame(), &DetectionParams::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cancelled");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(detector.requested().len(), 2);
    }

    #[test]
    fn test_caller_confidence_does_not_seed_ladder() {
        let detector = Arc::new(ThresholdDetector::new(Some(0.9)));
        let params = DetectionParams::default().with_confidence(0.9);
        use_case(detector.clone()).execute(&frame(), &params).unwrap();
        assert_eq!(detector.requested(), vec![0.5]);
    }
}
