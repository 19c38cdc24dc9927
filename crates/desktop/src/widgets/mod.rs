pub mod result_view;
pub mod status_banner;
pub mod video_view;
