pub mod annotated_image;
pub mod blocking;
