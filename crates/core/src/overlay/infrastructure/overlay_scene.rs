use crate::overlay::domain::overlay_canvas::{Color, OverlayCanvas, Rect};

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Rect {
        rect: Rect,
        color: Color,
        line_width: f32,
    },
    Text {
        content: String,
        x: f32,
        y: f32,
        color: Color,
        size: f32,
    },
}

/// Canvas that records draw calls as a list of shapes.
///
/// Front ends replay the scene onto their own drawing surface (the desktop
/// app uses an iced canvas); tests inspect it directly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayScene {
    width: f32,
    height: f32,
    shapes: Vec<Shape>,
}

impl OverlayScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn rects(&self) -> impl Iterator<Item = &Rect> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Rect { rect, .. } => Some(rect),
            Shape::Text { .. } => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text { content, .. } => Some(content.as_str()),
            Shape::Rect { .. } => None,
        })
    }
}

impl OverlayCanvas for OverlayScene {
    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.shapes.clear();
    }

    fn clear(&mut self) {
        self.shapes.clear();
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) {
        self.shapes.push(Shape::Rect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32) {
        self.shapes.push(Shape::Text {
            content: text.to_string(),
            x,
            y,
            color,
            size,
        });
    }
}
