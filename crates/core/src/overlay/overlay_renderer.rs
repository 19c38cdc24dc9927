use crate::capture::domain::video_surface::VideoSurface;
use crate::overlay::domain::overlay_canvas::{Color, OverlayCanvas, Rect};
use crate::shared::detection_result::{BoundingBox, DetectionResult, Face, ImageSize};
use crate::shared::detection_summary::format_percent;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub color: Color,
    pub line_width: f32,
    pub font_size: f32,
    /// Gap between the label baseline and the top edge of its box.
    pub label_offset: f32,
    /// Append the dominant emotion to the label when the face carries one.
    pub show_emotion: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Color::GREEN,
            line_width: 3.0,
            font_size: 16.0,
            label_offset: 5.0,
            show_emotion: true,
        }
    }
}

/// Maps detection coordinates onto the displayed video in two stages:
/// original image pixels to native video pixels, then native to display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapping {
    to_native: (f64, f64),
    to_display: (f64, f64),
}

impl CoordinateMapping {
    /// `None` when the native size is degenerate. A zero original size falls
    /// back to the native size.
    pub fn new(original: ImageSize, native: (u32, u32), display: (f32, f32)) -> Option<Self> {
        let (nw, nh) = (native.0 as f64, native.1 as f64);
        if nw <= 0.0 || nh <= 0.0 {
            return None;
        }
        let (ow, oh) = if original.width == 0 || original.height == 0 {
            (nw, nh)
        } else {
            (original.width as f64, original.height as f64)
        };
        Some(Self {
            to_native: (nw / ow, nh / oh),
            to_display: (display.0 as f64 / nw, display.1 as f64 / nh),
        })
    }

    pub fn map(&self, bbox: &BoundingBox) -> Rect {
        let sx = self.to_native.0 * self.to_display.0;
        let sy = self.to_native.1 * self.to_display.1;
        Rect {
            x: (bbox.x1 * sx) as f32,
            y: (bbox.y1 * sy) as f32,
            width: (bbox.width() * sx) as f32,
            height: (bbox.height() * sy) as f32,
        }
    }
}

/// Draws bounding boxes and confidence labels over a [`VideoSurface`].
#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn set_show_emotion(&mut self, show: bool) {
        self.style.show_emotion = show;
    }

    /// Redraws `canvas` for the surface's current frame. A missing result or
    /// one without faces leaves the canvas cleared.
    pub fn render(
        &self,
        surface: &VideoSurface,
        result: Option<&DetectionResult>,
        canvas: &mut dyn OverlayCanvas,
    ) {
        match (surface.native_size(), surface.display_size()) {
            (Some(native), Some(display)) => self.render_at(native, display, result, canvas),
            _ => canvas.clear(),
        }
    }

    pub fn render_at(
        &self,
        native: (u32, u32),
        display: (f32, f32),
        result: Option<&DetectionResult>,
        canvas: &mut dyn OverlayCanvas,
    ) {
        canvas.resize(display.0, display.1);
        canvas.clear();

        let Some(result) = result.filter(|r| !r.faces.is_empty()) else {
            return;
        };
        let Some(mapping) = CoordinateMapping::new(result.original_image_size, native, display)
        else {
            log::trace!("Skipping overlay for degenerate surface {native:?}");
            return;
        };

        for face in &result.faces {
            let rect = mapping.map(&face.bbox);
            canvas.stroke_rect(rect, self.style.color, self.style.line_width);
            canvas.fill_text(
                &self.label(face),
                rect.x,
                rect.y - self.style.label_offset,
                self.style.color,
                self.style.font_size,
            );
        }
    }

    fn label(&self, face: &Face) -> String {
        let confidence = format_percent(face.confidence);
        match &face.emotion {
            Some(emotion) if self.style.show_emotion => {
                format!("{confidence} {}", emotion.dominant_emotion)
            }
            _ => confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::infrastructure::overlay_scene::{OverlayScene, Shape};
    use crate::shared::detection_result::{AllEmotions, EmotionData};
    use crate::shared::frame::Frame;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    fn result(original: (u32, u32), faces: Vec<Face>) -> DetectionResult {
        DetectionResult {
            processing_time: 0.01,
            original_image_size: ImageSize {
                width: original.0,
                height: original.1,
            },
            face_count: faces.len(),
            faces,
        }
    }

    #[test]
    fn test_two_stage_mapping() {
        let result = result((200, 200), vec![Face::from_bbox(0.9, bbox(0.0, 0.0, 100.0, 100.0))]);
        let mut scene = OverlayScene::new();

        OverlayRenderer::default().render_at((400, 400), (800.0, 800.0), Some(&result), &mut scene);

        assert_eq!(scene.size(), (800.0, 800.0));
        let rects: Vec<_> = scene.rects().collect();
        assert_eq!(
            rects,
            vec![&Rect {
                x: 0.0,
                y: 0.0,
                width: 400.0,
                height: 400.0
            }]
        );
    }

    #[rstest]
    #[case((640, 480), (640, 480), (320.0, 240.0), 50.0, 25.0)]
    #[case((1280, 960), (640, 480), (640.0, 480.0), 50.0, 25.0)]
    #[case((0, 0), (640, 480), (640.0, 480.0), 100.0, 50.0)]
    fn test_mapping_scales(
        #[case] original: (u32, u32),
        #[case] native: (u32, u32),
        #[case] display: (f32, f32),
        #[case] expected_x: f32,
        #[case] expected_y: f32,
    ) {
        let size = ImageSize {
            width: original.0,
            height: original.1,
        };
        let mapping = CoordinateMapping::new(size, native, display).unwrap();
        let rect = mapping.map(&bbox(100.0, 50.0, 200.0, 150.0));
        assert_relative_eq!(rect.x, expected_x);
        assert_relative_eq!(rect.y, expected_y);
    }

    #[test]
    fn test_degenerate_native_size_has_no_mapping() {
        let size = ImageSize {
            width: 100,
            height: 100,
        };
        assert!(CoordinateMapping::new(size, (0, 0), (100.0, 100.0)).is_none());
    }

    #[test]
    fn test_label_drawn_above_box() {
        let result = result((100, 100), vec![Face::from_bbox(0.934, bbox(10.0, 20.0, 30.0, 40.0))]);
        let mut scene = OverlayScene::new();

        OverlayRenderer::default().render_at((100, 100), (100.0, 100.0), Some(&result), &mut scene);

        assert_eq!(
            scene.shapes()[0],
            Shape::Rect {
                rect: Rect {
                    x: 10.0,
                    y: 20.0,
                    width: 20.0,
                    height: 20.0
                },
                color: Color::GREEN,
                line_width: 3.0,
            }
        );
        assert_eq!(
            scene.shapes()[1],
            Shape::Text {
                content: "93.4%".into(),
                x: 10.0,
                y: 15.0,
                color: Color::GREEN,
                size: 16.0,
            }
        );
    }

    #[test]
    fn test_emotion_suffix_can_be_toggled() {
        let mut face = Face::from_bbox(0.5, bbox(0.0, 0.0, 10.0, 10.0));
        face.emotion = Some(EmotionData {
            dominant_emotion: "happy".into(),
            confidence: 0.8,
            all_emotions: AllEmotions {
                happy: 0.8,
                neutral: 0.1,
                surprise: 0.02,
                sad: 0.02,
                angry: 0.02,
                fear: 0.02,
                disgust: 0.02,
            },
        });
        let result = result((10, 10), vec![face]);
        let mut renderer = OverlayRenderer::default();
        let mut scene = OverlayScene::new();

        renderer.render_at((10, 10), (10.0, 10.0), Some(&result), &mut scene);
        assert_eq!(scene.labels().collect::<Vec<_>>(), vec!["50.0% happy"]);

        renderer.set_show_emotion(false);
        renderer.render_at((10, 10), (10.0, 10.0), Some(&result), &mut scene);
        assert_eq!(scene.labels().collect::<Vec<_>>(), vec!["50.0%"]);
    }

    #[test]
    fn test_no_result_or_no_faces_clears() {
        let mut scene = OverlayScene::new();
        let renderer = OverlayRenderer::default();
        let full = result((10, 10), vec![Face::from_bbox(0.9, bbox(0.0, 0.0, 5.0, 5.0))]);

        renderer.render_at((10, 10), (10.0, 10.0), Some(&full), &mut scene);
        assert!(!scene.is_empty());

        renderer.render_at((10, 10), (10.0, 10.0), None, &mut scene);
        assert!(scene.is_empty());

        renderer.render_at((10, 10), (10.0, 10.0), Some(&result((10, 10), vec![])), &mut scene);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_render_uses_surface_sizes() {
        let surface = VideoSurface::new();
        surface.attach();
        surface.present(Frame::new(vec![0u8; 20 * 10 * 3], 20, 10, 1));
        surface.set_display_size(40.0, 20.0);
        let result = result((20, 10), vec![Face::from_bbox(0.9, bbox(5.0, 5.0, 10.0, 10.0))]);
        let mut scene = OverlayScene::new();

        OverlayRenderer::default().render(&surface, Some(&result), &mut scene);

        assert_eq!(scene.size(), (40.0, 20.0));
        let rect = scene.rects().next().unwrap();
        assert_relative_eq!(rect.x, 10.0);
        assert_relative_eq!(rect.width, 10.0);
    }

    #[test]
    fn test_render_without_frame_clears() {
        let mut scene = OverlayScene::new();
        scene.fill_text("stale", 0.0, 0.0, Color::GREEN, 16.0);
        OverlayRenderer::default().render(&VideoSurface::new(), None, &mut scene);
        assert!(scene.is_empty());
    }
}
