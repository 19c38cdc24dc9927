use iced::widget::{button, container, row, text, Space};
use iced::{Element, Length, Theme};

use facecam_core::shared::server_status::ServerStatus;

use crate::app::{scaled, Message};
use crate::theme::status_color;

/// One-line server health indicator with a manual refresh.
pub fn view<'a>(status: Option<&ServerStatus>, fs: f32, theme: &Theme) -> Element<'a, Message> {
    let (label, healthy) = match status {
        None => ("Checking detection service\u{2026}".to_string(), false),
        Some(s) if s.is_healthy() => match &s.message {
            Some(m) => (format!("Detection service online: {m}"), true),
            None => ("Detection service online".to_string(), true),
        },
        Some(s) => (
            format!(
                "Detection service unavailable: {}",
                s.message.as_deref().unwrap_or("no response")
            ),
            false,
        ),
    };
    let dot_color = match status {
        None => crate::theme::muted_color(theme),
        Some(_) => status_color(theme, healthy),
    };

    let refresh = button(text("Refresh").size(scaled(12.0, fs)))
        .on_press_maybe(status.map(|_| Message::RefreshHealth))
        .style(button::text)
        .padding([2, 8]);

    container(
        row![
            text("\u{25CF}").size(scaled(12.0, fs)).color(dot_color),
            text(label).size(scaled(12.0, fs)),
            Space::new().width(Length::Fill),
            refresh,
        ]
        .spacing(8)
        .align_y(iced::Alignment::Center),
    )
    .width(Length::Fill)
    .padding([4, 12])
    .into()
}
