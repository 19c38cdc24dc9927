use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

pub const HEALTH_ENDPOINT: &str = "/health";
pub const DETECT_ENDPOINT: &str = "/detect";
pub const DETECT_AND_ANNOTATE_ENDPOINT: &str = "/detect-and-annotate";

/// Message used when an error response carries no parseable body.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Confidence tried at each escalation attempt; index 0 is the starting value.
pub const ESCALATION_LADDER: [f64; 5] = [DEFAULT_CONFIDENCE, 0.3, 0.2, 0.1, 0.7];
pub const MAX_ESCALATION_ATTEMPTS: u32 = 5;
pub const ESCALATION_RETRY_DELAY: Duration = Duration::from_millis(500);

pub const REALTIME_TARGET_FPS: u32 = 30;
pub const REALTIME_DETECTION_INTERVAL: Duration = Duration::from_millis(500);
pub const SURFACE_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// JPEG quality for captured stills (0-100).
pub const CAPTURE_JPEG_QUALITY: u8 = 80;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];
