use iced::mouse;
use iced::widget::canvas::{self, Path, Stroke};
use iced::widget::image::Handle;
use iced::widget::{canvas as canvas_widget, container, image, stack, text};
use iced::{Color, ContentFit, Element, Length, Pixels, Point, Rectangle, Renderer, Size, Theme};

use facecam_core::capture::domain::video_surface::VideoSurface;
use facecam_core::overlay::domain::overlay_canvas;
use facecam_core::overlay::infrastructure::overlay_scene::{OverlayScene, Shape};
use facecam_core::shared::frame::Frame;

use crate::app::{scaled, Message};

/// Latest camera frame converted for display.
#[derive(Default)]
pub struct LiveFrame {
    handle: Option<Handle>,
    sequence: Option<u64>,
    native: Option<(u32, u32)>,
}

impl LiveFrame {
    /// Picks up the surface's current frame if it changed since last time.
    pub fn refresh(&mut self, surface: &VideoSurface) {
        match surface.current_frame() {
            Some(frame) if self.sequence != Some(frame.sequence()) => self.set(&frame),
            Some(_) => {}
            None => *self = Self::default(),
        }
    }

    fn set(&mut self, frame: &Frame) {
        self.handle = Some(Handle::from_rgba(
            frame.width(),
            frame.height(),
            frame.to_rgba(),
        ));
        self.sequence = Some(frame.sequence());
        self.native = Some((frame.width(), frame.height()));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Camera feed with the detection overlay drawn on top.
pub fn view<'a>(
    live: &LiveFrame,
    scene: &OverlayScene,
    surface: &VideoSurface,
    height: f32,
    fs: f32,
) -> Element<'a, Message> {
    let (Some(handle), Some(native)) = (live.handle.clone(), live.native) else {
        return container(text("Camera is off").size(scaled(13.0, fs)))
            .width(Length::Fill)
            .height(height)
            .center_x(Length::Fill)
            .center_y(height)
            .into();
    };

    let layer = OverlayLayer {
        scene: scene.clone(),
        native,
        surface: surface.clone(),
    };

    stack![
        image(handle)
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .height(Length::Fill),
        canvas_widget(layer).width(Length::Fill).height(Length::Fill),
    ]
    .width(Length::Fill)
    .height(height)
    .into()
}

/// Where a `native`-sized frame lands inside `bounds` when fitted with
/// [`ContentFit::Contain`].
pub fn fit_rect(bounds: Size, native: (u32, u32)) -> Rectangle {
    let (nw, nh) = (native.0 as f32, native.1 as f32);
    if nw <= 0.0 || nh <= 0.0 {
        return Rectangle::new(Point::ORIGIN, Size::ZERO);
    }
    let scale = (bounds.width / nw).min(bounds.height / nh);
    let size = Size::new(nw * scale, nh * scale);
    Rectangle::new(
        Point::new(
            (bounds.width - size.width) / 2.0,
            (bounds.height - size.height) / 2.0,
        ),
        size,
    )
}

struct OverlayLayer {
    scene: OverlayScene,
    native: (u32, u32),
    surface: VideoSurface,
}

impl<M> canvas::Program<M> for OverlayLayer {
    type State = ();

    fn draw(
        &self,
        _state: &(),
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let fit = fit_rect(bounds.size(), self.native);
        self.surface.set_display_size(fit.width, fit.height);

        // The scene was laid out for the previous display size.
        let (scene_w, scene_h) = self.scene.size();
        let sx = if scene_w > 0.0 { fit.width / scene_w } else { 1.0 };
        let sy = if scene_h > 0.0 { fit.height / scene_h } else { 1.0 };
        let place = |x: f32, y: f32| Point::new(fit.x + x * sx, fit.y + y * sy);

        for shape in self.scene.shapes() {
            match shape {
                Shape::Rect {
                    rect,
                    color,
                    line_width,
                } => {
                    let path = Path::rectangle(
                        place(rect.x, rect.y),
                        Size::new(rect.width * sx, rect.height * sy),
                    );
                    frame.stroke(
                        &path,
                        Stroke::default()
                            .with_color(to_iced(*color))
                            .with_width(*line_width),
                    );
                }
                Shape::Text {
                    content,
                    x,
                    y,
                    color,
                    size,
                } => {
                    // Canvas text is anchored at its top edge.
                    let baseline = place(*x, *y);
                    frame.fill_text(canvas::Text {
                        content: content.clone(),
                        position: Point::new(baseline.x, baseline.y - *size),
                        color: to_iced(*color),
                        size: Pixels(*size),
                        ..canvas::Text::default()
                    });
                }
            }
        }

        vec![frame.into_geometry()]
    }
}

fn to_iced(color: overlay_canvas::Color) -> Color {
    Color::from_rgb8(color.r, color.g, color.b)
}
