pub mod about_tab;
pub mod camera_tab;
pub mod realtime_tab;
pub mod settings_tab;
pub mod upload_tab;
