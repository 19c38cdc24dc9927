use iced::widget::{button, column, text, Space};
use iced::Element;

use crate::app::{scaled, Message};

pub fn view<'a>(server_url: &'a str, fs: f32) -> Element<'a, Message> {
    let version = env!("CARGO_PKG_VERSION");

    column![
        text("FaceCam").size(scaled(22.0, fs)),
        Space::new().height(4),
        text(format!("Version {version}")).size(scaled(13.0, fs)),
        Space::new().height(12),
        text(
            "Detects faces in photos and live camera video using a remote \
             detection service. Images are sent to the service configured \
             in Settings and are not stored by this app."
        )
        .size(scaled(13.0, fs)),
        Space::new().height(12),
        text(format!("Service: {server_url}")).size(scaled(13.0, fs)),
        Space::new().height(16),
        button(text("Open service in browser").size(scaled(13.0, fs)))
            .on_press(Message::OpenServer)
            .padding([8, 16]),
    ]
    .spacing(0)
    .into()
}
