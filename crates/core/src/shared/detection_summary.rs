use crate::shared::detection_result::{DetectionResult, Face};

/// Confidence in [0, 1] rendered as a percentage with one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Display-ready view of one detected face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceSummary {
    pub label: String,
    pub confidence: String,
    pub position: String,
    pub size: String,
    pub area: String,
    pub landmarks: bool,
    pub emotion: Option<String>,
    pub all_emotions: Vec<(String, String)>,
    pub age: Option<String>,
}

/// Display-ready view of a detection result, shared by the CLI and the GUI.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSummary {
    pub processing_time: String,
    pub image_size: String,
    pub face_count: usize,
    pub faces: Vec<FaceSummary>,
}

impl ResultSummary {
    pub fn from_result(result: &DetectionResult) -> Self {
        Self {
            processing_time: format!("{:.3}s", result.processing_time),
            image_size: format!(
                "{} \u{00D7} {}",
                result.original_image_size.width, result.original_image_size.height
            ),
            face_count: result.face_count,
            faces: result
                .faces
                .iter()
                .enumerate()
                .map(|(i, face)| summarize_face(i, face))
                .collect(),
        }
    }

    /// Plain-text rendering, one fact per line.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Processing time: {}", self.processing_time),
            format!("Image size: {}", self.image_size),
            format!("Faces found: {}", self.face_count),
        ];
        if self.faces.is_empty() {
            lines.push(
                "No faces detected in the image. Try adjusting the confidence threshold."
                    .to_string(),
            );
        }
        for face in &self.faces {
            lines.push(format!("{}: confidence {}", face.label, face.confidence));
            lines.push(format!("  Position: {}", face.position));
            lines.push(format!("  Size: {}", face.size));
            lines.push(format!("  Area: {}", face.area));
            if face.landmarks {
                lines.push("  Facial landmarks detected".to_string());
            }
            if let Some(emotion) = &face.emotion {
                lines.push(format!("  Emotion: {emotion}"));
                for (name, pct) in &face.all_emotions {
                    lines.push(format!("    {name}: {pct}"));
                }
            }
            if let Some(age) = &face.age {
                lines.push(format!("  Age: {age}"));
            }
        }
        lines
    }
}

fn summarize_face(index: usize, face: &Face) -> FaceSummary {
    let b = &face.bbox;
    FaceSummary {
        label: format!("Face {}", index + 1),
        confidence: format_percent(face.confidence),
        position: format!("({:.0}, {:.0}) to ({:.0}, {:.0})", b.x1, b.y1, b.x2, b.y2),
        size: format!("{:.0} \u{00D7} {:.0} pixels", face.width, face.height),
        area: format!("{:.0} pixels\u{00B2}", face.area),
        landmarks: face.landmarks.unwrap_or(false),
        emotion: face.emotion.as_ref().map(|e| {
            format!("{} ({})", e.dominant_emotion, format_percent(e.confidence))
        }),
        all_emotions: face
            .emotion
            .as_ref()
            .map(|e| {
                e.all_emotions
                    .ranked()
                    .into_iter()
                    .map(|(name, score)| (name.to_string(), format_percent(score)))
                    .collect()
            })
            .unwrap_or_default(),
        age: face.age.map(|a| {
            format!(
                "~{:.0} years ({}-{})",
                a.estimated_age, a.age_range.min, a.age_range.max
            )
        }),
    }
}
