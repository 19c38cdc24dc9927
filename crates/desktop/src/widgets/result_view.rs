use iced::widget::{column, text, Column, Space};
use iced::{Element, Theme};

use facecam_core::shared::detection_result::DetectionResult;
use facecam_core::shared::detection_summary::{FaceSummary, ResultSummary};

use crate::app::{scaled, Message};
use crate::theme::muted_color;

/// Detection statistics followed by one block per face.
pub fn view<'a>(result: &DetectionResult, fs: f32, theme: &Theme) -> Element<'a, Message> {
    let summary = ResultSummary::from_result(result);
    let muted = muted_color(theme);

    let mut content = column![
        text("Detection results").size(scaled(16.0, fs)),
        Space::new().height(6),
        text(format!(
            "{} face(s) \u{00B7} {} \u{00B7} processed in {}",
            summary.face_count, summary.image_size, summary.processing_time
        ))
        .size(scaled(13.0, fs))
        .color(muted),
        Space::new().height(8),
    ];

    if summary.faces.is_empty() {
        content = content.push(
            text("No faces detected in the image. Try adjusting the confidence threshold.")
                .size(scaled(13.0, fs)),
        );
    }
    for face in &summary.faces {
        content = content.push(face_block(face, fs, muted));
    }
    content.into()
}

fn face_block<'a>(face: &FaceSummary, fs: f32, muted: iced::Color) -> Element<'a, Message> {
    let mut block: Column<'a, Message> = column![
        text(format!("{}: {}", face.label, face.confidence)).size(scaled(14.0, fs)),
        text(format!(
            "Position {} \u{00B7} Size {} \u{00B7} Area {}",
            face.position, face.size, face.area
        ))
        .size(scaled(12.0, fs))
        .color(muted),
    ]
    .spacing(2);

    if face.landmarks {
        block = block.push(text("Facial landmarks detected").size(scaled(12.0, fs)));
    }
    if let Some(emotion) = &face.emotion {
        block = block.push(text(format!("Emotion: {emotion}")).size(scaled(12.0, fs)));
        let ranked = face
            .all_emotions
            .iter()
            .map(|(name, pct)| format!("{name} {pct}"))
            .collect::<Vec<_>>()
            .join(", ");
        block = block.push(text(ranked).size(scaled(11.0, fs)).color(muted));
    }
    if let Some(age) = &face.age {
        block = block.push(text(format!("Age: {age}")).size(scaled(12.0, fs)));
    }

    column![block, Space::new().height(8)].into()
}
