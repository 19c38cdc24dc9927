use iced::widget::{button, checkbox, column, row, slider, text, Space};
use iced::{Element, Theme};

use facecam_core::capture::domain::video_surface::VideoSurface;
use facecam_core::overlay::infrastructure::overlay_scene::OverlayScene;
use facecam_core::realtime::domain::loop_state::LoopState;
use facecam_core::realtime::realtime_detection_loop::LoopSnapshot;

use crate::app::{scaled, Message};
use crate::settings::Settings;
use crate::theme::muted_color;
use crate::widgets::video_view::{self, LiveFrame};

#[derive(Default)]
pub struct RealtimeState {
    pub starting: bool,
    pub snapshot: Option<LoopSnapshot>,
    pub live: LiveFrame,
    /// Confidence in percent sent with every realtime request.
    pub confidence: u32,
    pub emotions: bool,
    pub error: Option<String>,
}

impl RealtimeState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            confidence: settings.confidence,
            emotions: settings.emotions,
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.starting
            || self
                .snapshot
                .as_ref()
                .is_some_and(|s| s.state != LoopState::Idle)
    }

    pub fn stopped(&mut self) {
        self.starting = false;
        self.snapshot = None;
        self.live.clear();
    }
}

pub fn view<'a>(
    state: &'a RealtimeState,
    surface: &VideoSurface,
    healthy: bool,
    fs: f32,
    theme: &Theme,
) -> Element<'a, Message> {
    let muted = muted_color(theme);
    let running = state.is_running();

    let toggle = if running {
        button(text("Stop").size(scaled(13.0, fs)))
            .on_press(Message::StopRealtime)
            .style(button::secondary)
    } else {
        button(text("Start realtime detection").size(scaled(13.0, fs)))
            .on_press_maybe(healthy.then_some(Message::StartRealtime))
            .style(button::primary)
    };

    let controls = column![
        row![
            toggle.padding([8, 16]),
            checkbox(state.emotions)
                .label("Show emotions")
                .on_toggle(Message::RealtimeEmotionsToggled)
                .text_size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        row![
            text("Confidence").size(scaled(13.0, fs)),
            slider(10..=100, state.confidence, Message::RealtimeConfidenceChanged),
            text(format!("{}%", state.confidence)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
    ]
    .spacing(10);

    let empty_scene = OverlayScene::new();
    let scene = state.snapshot.as_ref().map_or(&empty_scene, |s| &s.scene);

    let mut content = column![
        controls,
        Space::new().height(12),
        video_view::view(&state.live, scene, surface, 360.0, fs),
        Space::new().height(8),
    ]
    .spacing(4);

    if let Some(snapshot) = &state.snapshot {
        let faces = snapshot
            .face_count
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        content = content.push(
            text(format!(
                "{}  |  {} FPS  |  Faces: {faces}",
                snapshot.state, snapshot.fps
            ))
            .size(scaled(13.0, fs)),
        );
        if let Some(error) = &snapshot.last_error {
            content = content.push(
                text(format!("Last detection failed: {error}"))
                    .size(scaled(12.0, fs))
                    .color(muted),
            );
        }
    } else if state.starting {
        content = content.push(text("Starting camera\u{2026}").size(scaled(13.0, fs)).color(muted));
    }

    if let Some(error) = &state.error {
        content = content.push(
            text(format!("Error: {error}"))
                .size(scaled(13.0, fs))
                .color(theme.palette().danger),
        );
    }

    content.into()
}
