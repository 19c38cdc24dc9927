/// Axis-aligned rectangle in display (logical pixel) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// 2D drawing target layered over a [`VideoSurface`].
///
/// [`VideoSurface`]: crate::capture::domain::video_surface::VideoSurface
pub trait OverlayCanvas {
    /// Sets the drawing area; existing content is discarded.
    fn resize(&mut self, width: f32, height: f32);

    fn clear(&mut self);

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32);

    /// Draws `text` with its baseline starting at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32);
}
