pub mod domain;
pub mod realtime_detection_loop;
