use std::path::PathBuf;

use iced::widget::image::Handle;
use iced::widget::{button, checkbox, column, container, image, row, slider, text, Space};
use iced::{ContentFit, Element, Length, Theme};

use facecam_core::detection::domain::detection_service::DetectionParams;
use facecam_core::shared::detection_result::DetectionResult;

use crate::app::{scaled, AnnotatedSource, Message};
use crate::settings::Settings;
use crate::theme::muted_color;
use crate::widgets::result_view;
use crate::workers::annotated_image::AnnotatedImage;

#[derive(Default)]
pub struct UploadState {
    pub path: Option<PathBuf>,
    pub preview: Option<Handle>,
    /// Confidence in percent for this page, seeded from settings.
    pub confidence: u32,
    pub emotions: bool,
    pub age: bool,
    pub busy: bool,
    pub result: Option<DetectionResult>,
    pub annotated: Option<AnnotatedImage>,
    pub error: Option<String>,
}

impl UploadState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            confidence: settings.confidence,
            emotions: settings.emotions,
            age: settings.age,
            ..Self::default()
        }
    }

    pub fn params(&self) -> DetectionParams {
        DetectionParams {
            confidence: self.confidence as f64 / 100.0,
            emotions: self.emotions,
            age: self.age,
        }
    }

    /// Whether the detect and annotate actions can run.
    pub fn can_detect(&self, healthy: bool) -> bool {
        healthy && self.path.is_some() && !self.busy
    }

    /// Forgets the previous image's outputs.
    pub fn reset_outputs(&mut self) {
        self.result = None;
        self.annotated = None;
        self.error = None;
    }
}

pub fn view<'a>(
    state: &'a UploadState,
    healthy: bool,
    fs: f32,
    theme: &Theme,
) -> Element<'a, Message> {
    let muted = muted_color(theme);

    let picker = row![
        button(text("Choose image\u{2026}").size(scaled(13.0, fs)))
            .on_press_maybe((!state.busy).then_some(Message::SelectImage))
            .padding([8, 16]),
        text(
            state
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "No image selected".to_string())
        )
        .size(scaled(13.0, fs))
        .color(muted),
    ]
    .spacing(12)
    .align_y(iced::Alignment::Center);

    let controls = column![
        row![
            text("Confidence").size(scaled(13.0, fs)),
            slider(10..=100, state.confidence, Message::UploadConfidenceChanged),
            text(format!("{}%", state.confidence)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        row![
            checkbox(state.emotions)
                .label("Emotion analysis")
                .on_toggle(Message::UploadEmotionsToggled)
                .text_size(scaled(13.0, fs)),
            checkbox(state.age)
                .label("Age estimation")
                .on_toggle(Message::UploadAgeToggled)
                .text_size(scaled(13.0, fs)),
        ]
        .spacing(20),
    ]
    .spacing(10);

    let ready = state.can_detect(healthy);
    let actions = row![
        button(text("Detect faces").size(scaled(13.0, fs)))
            .on_press_maybe(ready.then_some(Message::DetectUpload))
            .style(button::primary)
            .padding([8, 16]),
        button(text("Annotated image").size(scaled(13.0, fs)))
            .on_press_maybe(ready.then_some(Message::AnnotateUpload))
            .style(button::secondary)
            .padding([8, 16]),
        button(text("Clear").size(scaled(13.0, fs)))
            .on_press_maybe((state.path.is_some() && !state.busy).then_some(Message::ClearUpload))
            .style(button::text)
            .padding([8, 16]),
    ]
    .spacing(10);

    let mut content = column![
        picker,
        Space::new().height(12),
        controls,
        Space::new().height(12),
        actions,
    ]
    .spacing(0);

    if state.busy {
        content = content.push(text("Processing\u{2026}").size(scaled(13.0, fs)).color(muted));
    }
    if let Some(error) = &state.error {
        content = content.push(
            text(format!("Error: {error}"))
                .size(scaled(13.0, fs))
                .color(theme.palette().danger),
        );
    }

    let shown = state
        .annotated
        .as_ref()
        .map(|a| a.handle().clone())
        .or_else(|| state.preview.clone());
    if let Some(handle) = shown {
        content = content.push(Space::new().height(12)).push(
            container(image(handle).content_fit(ContentFit::Contain))
                .width(Length::Fill)
                .height(320),
        );
    }
    if state.annotated.is_some() {
        content = content.push(
            button(text("Save annotated image\u{2026}").size(scaled(13.0, fs)))
                .on_press(Message::SaveAnnotated(AnnotatedSource::Upload))
                .padding([6, 14]),
        );
    }
    if let Some(result) = &state.result {
        content = content
            .push(Space::new().height(12))
            .push(result_view::view(result, fs, theme));
    }

    content.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use facecam_core::shared::server_status::ServerStatus;

    fn selected() -> UploadState {
        UploadState {
            path: Some(PathBuf::from("group.jpg")),
            ..UploadState::new(&Settings::default())
        }
    }

    #[test]
    fn test_detect_needs_healthy_server() {
        let state = selected();
        let healthy = ServerStatus::unhealthy("connection refused").is_healthy();
        assert!(!state.can_detect(healthy));
        assert!(state.can_detect(true));
    }

    #[test]
    fn test_detect_needs_selected_image() {
        let state = UploadState::new(&Settings::default());
        assert!(!state.can_detect(true));
    }

    #[test]
    fn test_detect_disabled_while_busy() {
        let mut state = selected();
        state.busy = true;
        assert!(!state.can_detect(true));
        state.busy = false;
        assert!(state.can_detect(true));
    }

    #[test]
    fn test_new_state_takes_settings_defaults() {
        let settings = Settings {
            confidence: 35,
            age: true,
            ..Settings::default()
        };
        let state = UploadState::new(&settings);
        let params = state.params();
        assert_relative_eq!(params.confidence, 0.35);
        assert_eq!(params.emotions, settings.emotions);
        assert!(params.age);
    }
}
