use iced::widget::{button, checkbox, column, pick_list, row, slider, text, text_input, Space};
use iced::Element;

use crate::app::{scaled, Message};
use crate::settings::{Appearance, Settings};

pub fn view<'a>(settings: &'a Settings, server_draft: &'a str) -> Element<'a, Message> {
    let fs = settings.font_scale;
    let dirty = server_draft.trim() != settings.server_url;

    column![
        text("Detection service").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text_input("https://example.com/api", server_draft)
                .on_input(Message::ServerUrlChanged)
                .on_submit(Message::ApplyServerUrl)
                .size(scaled(13.0, fs))
                .padding(6),
            button(text("Apply").size(scaled(13.0, fs)))
                .on_press_maybe(dirty.then_some(Message::ApplyServerUrl))
                .padding([6, 14]),
        ]
        .spacing(8)
        .align_y(iced::Alignment::Center),
        Space::new().height(20),
        text("Detection defaults").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Confidence").size(scaled(13.0, fs)),
            slider(10..=100, settings.confidence, Message::ConfidenceChanged),
            text(format!("{}%", settings.confidence)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        Space::new().height(8),
        checkbox(settings.emotions)
            .label("Emotion analysis")
            .on_toggle(Message::EmotionsChanged)
            .text_size(scaled(13.0, fs)),
        checkbox(settings.age)
            .label("Age estimation")
            .on_toggle(Message::AgeChanged)
            .text_size(scaled(13.0, fs)),
        Space::new().height(12),
        button(text("Restore defaults").size(scaled(13.0, fs)))
            .on_press(Message::RestoreDefaults)
            .style(button::secondary)
            .padding([6, 14]),
        Space::new().height(24),
        text("Appearance").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Mode").size(scaled(13.0, fs)),
            pick_list(Appearance::ALL, Some(settings.appearance), Message::AppearanceChanged)
                .text_size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        Space::new().height(12),
        checkbox(settings.high_contrast)
            .label("High contrast")
            .on_toggle(Message::HighContrastChanged)
            .text_size(scaled(13.0, fs)),
        Space::new().height(12),
        row![
            text("Font size").size(scaled(13.0, fs)),
            slider(0.8..=1.5, settings.font_scale, Message::FontScaleChanged).step(0.05),
            text(format!("{:.0}%", settings.font_scale * 100.0)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
    ]
    .spacing(4)
    .into()
}
