use std::sync::{Arc, Mutex, PoisonError};

use iced::widget::{button, checkbox, column, container, image, row, text, Space};
use iced::{ContentFit, Element, Length, Theme};

use facecam_core::capture::domain::video_surface::VideoSurface;
use facecam_core::capture::media_capture::StreamHandle;
use facecam_core::overlay::infrastructure::overlay_scene::OverlayScene;
use facecam_core::overlay::overlay_renderer::{OverlayRenderer, OverlayStyle};
use facecam_core::shared::detection_result::DetectionResult;
use facecam_core::shared::detection_summary::format_percent;

use crate::app::{scaled, AnnotatedSource, Message};
use crate::theme::muted_color;
use crate::widgets::result_view;
use crate::widgets::video_view::{self, LiveFrame};
use crate::workers::annotated_image::AnnotatedImage;

/// Escalation progress written by the detection thread, read on tick.
pub type AttemptProgress = Arc<Mutex<Option<(u32, f64)>>>;

#[derive(Default)]
pub struct CameraState {
    pub surface: VideoSurface,
    pub stream: Option<StreamHandle>,
    pub starting: bool,
    pub detecting: bool,
    emotions: bool,
    renderer: OverlayRenderer,
    pub progress: AttemptProgress,
    pub attempt: Option<(u32, f64)>,
    pub live: LiveFrame,
    pub scene: OverlayScene,
    pub result: Option<DetectionResult>,
    /// Confidence the accepted result was found at.
    pub final_confidence: Option<f64>,
    pub annotated: Option<AnnotatedImage>,
    pub error: Option<String>,
}

impl CameraState {
    pub fn new(emotions: bool) -> Self {
        let mut state = Self {
            renderer: OverlayRenderer::new(OverlayStyle::default()),
            ..Self::default()
        };
        state.set_emotions(emotions);
        state
    }

    pub fn emotions(&self) -> bool {
        self.emotions
    }

    /// Requests emotions on the next capture and labels boxes with them.
    pub fn set_emotions(&mut self, on: bool) {
        self.emotions = on;
        self.renderer.set_show_emotion(on);
    }

    /// Whether a still can be captured and sent for detection.
    pub fn can_capture(&self, healthy: bool) -> bool {
        healthy && self.stream.is_some() && !self.detecting
    }

    /// Pulls the latest frame and redraws the overlay for the last result.
    pub fn refresh(&mut self) {
        self.live.refresh(&self.surface);
        self.renderer.render(&self.surface, self.result.as_ref(), &mut self.scene);
        self.attempt = *self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn camera_off(&mut self) {
        self.stream = None;
        self.starting = false;
        self.live.clear();
        self.scene = OverlayScene::new();
    }
}

pub fn view<'a>(
    state: &'a CameraState,
    healthy: bool,
    fs: f32,
    theme: &Theme,
) -> Element<'a, Message> {
    let muted = muted_color(theme);
    let on = state.stream.is_some();

    let camera_button = if on {
        button(text("Stop camera").size(scaled(13.0, fs)))
            .on_press_maybe((!state.detecting).then_some(Message::StopCamera))
            .style(button::secondary)
    } else {
        let label = if state.starting {
            "Starting\u{2026}"
        } else {
            "Start camera"
        };
        button(text(label).size(scaled(13.0, fs)))
            .on_press_maybe((!state.starting).then_some(Message::StartCamera))
            .style(button::primary)
    };

    let controls = row![
        camera_button.padding([8, 16]),
        button(text("Capture & detect").size(scaled(13.0, fs)))
            .on_press_maybe(state.can_capture(healthy).then_some(Message::CaptureAndDetect))
            .style(button::primary)
            .padding([8, 16]),
        checkbox(state.emotions)
            .label("Emotions")
            .on_toggle(Message::CameraEmotionsToggled)
            .text_size(scaled(13.0, fs)),
    ]
    .spacing(12)
    .align_y(iced::Alignment::Center);

    let mut content = column![
        controls,
        Space::new().height(12),
        video_view::view(&state.live, &state.scene, &state.surface, 320.0, fs),
    ];

    if state.detecting {
        let status = match state.attempt {
            Some((attempt, confidence)) if attempt > 0 => format!(
                "No faces yet, retrying at {} (attempt {} of 5)\u{2026}",
                format_percent(confidence),
                attempt + 1
            ),
            _ => "Detecting faces\u{2026}".to_string(),
        };
        content = content.push(text(status).size(scaled(13.0, fs)).color(muted));
    }
    if let Some(error) = &state.error {
        content = content.push(
            text(format!("Error: {error}"))
                .size(scaled(13.0, fs))
                .color(theme.palette().danger),
        );
    }
    if let Some(confidence) = state.final_confidence {
        content = content.push(
            text(format!("Accepted at confidence {}", format_percent(confidence)))
                .size(scaled(12.0, fs))
                .color(muted),
        );
    }
    if let Some(annotated) = &state.annotated {
        content = content
            .push(Space::new().height(12))
            .push(
                container(image(annotated.handle().clone()).content_fit(ContentFit::Contain))
                    .width(Length::Fill)
                    .height(240),
            )
            .push(
                button(text("Save annotated image\u{2026}").size(scaled(13.0, fs)))
                    .on_press(Message::SaveAnnotated(AnnotatedSource::Camera))
                    .padding([6, 14]),
            );
    }
    if let Some(result) = &state.result {
        content = content
            .push(Space::new().height(12))
            .push(result_view::view(result, fs, theme));
    }

    content.spacing(4).into()
}
