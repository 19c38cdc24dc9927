pub mod captured_frame;
pub mod client_config;
pub mod constants;
pub mod detection_result;
pub mod detection_summary;
pub mod frame;
pub mod server_status;
