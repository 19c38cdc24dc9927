pub mod capture;
pub mod detection;
pub mod overlay;
pub mod pipeline;
pub mod realtime;
pub mod shared;
