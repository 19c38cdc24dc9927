pub mod camera_backend;
pub mod capture_error;
pub mod video_surface;
