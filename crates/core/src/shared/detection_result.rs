use serde::{Deserialize, Serialize};

/// Tolerance for comparing the producer's derived float fields.
const DERIVED_FIELD_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Scores for the seven emotions the service classifies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllEmotions {
    pub happy: f64,
    pub neutral: f64,
    pub surprise: f64,
    pub sad: f64,
    pub angry: f64,
    pub fear: f64,
    pub disgust: f64,
}

impl AllEmotions {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("happy", self.happy),
            ("neutral", self.neutral),
            ("surprise", self.surprise),
            ("sad", self.sad),
            ("angry", self.angry),
            ("fear", self.fear),
            ("disgust", self.disgust),
        ]
        .into_iter()
    }

    /// Name of the highest-scoring emotion. Ties go to the first in order.
    pub fn argmax(&self) -> &'static str {
        let mut best = ("happy", self.happy);
        for (name, score) in self.iter().skip(1) {
            if score > best.1 {
                best = (name, score);
            }
        }
        best.0
    }

    /// Emotions sorted by descending score.
    pub fn ranked(&self) -> Vec<(&'static str, f64)> {
        let mut all: Vec<_> = self.iter().collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1));
        all
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionData {
    pub dominant_emotion: String,
    pub confidence: f64,
    pub all_emotions: AllEmotions,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeData {
    pub estimated_age: f64,
    pub age_range: AgeRange,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub width: f64,
    pub height: f64,
    pub area: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeData>,
}

impl Face {
    /// Builds a face whose derived size fields agree with `bbox`.
    pub fn from_bbox(confidence: f64, bbox: BoundingBox) -> Self {
        let width = bbox.width();
        let height = bbox.height();
        Self {
            confidence,
            bbox,
            width,
            height,
            area: width * height,
            landmarks: None,
            emotion: None,
            age: None,
        }
    }
}

/// Structured response of `POST /detect`.
///
/// Coordinates in `faces` are in the pixel space of `original_image_size`,
/// which is the image the service received, not whatever is on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub processing_time: f64,
    pub original_image_size: ImageSize,
    pub face_count: usize,
    #[serde(default)]
    pub faces: Vec<Face>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InvariantViolation {
    FaceCountMismatch { declared: usize, actual: usize },
    InvertedBox { face: usize },
    WidthMismatch { face: usize },
    HeightMismatch { face: usize },
    AreaMismatch { face: usize },
    DominantEmotionNotMax { face: usize, declared: String },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FaceCountMismatch { declared, actual } => {
                write!(f, "face_count is {declared} but {actual} faces were returned")
            }
            Self::InvertedBox { face } => write!(f, "face {face}: bbox corners are inverted"),
            Self::WidthMismatch { face } => write!(f, "face {face}: width != x2 - x1"),
            Self::HeightMismatch { face } => write!(f, "face {face}: height != y2 - y1"),
            Self::AreaMismatch { face } => write!(f, "face {face}: area != width * height"),
            Self::DominantEmotionNotMax { face, declared } => {
                write!(f, "face {face}: dominant emotion {declared} is not the top score")
            }
        }
    }
}

impl DetectionResult {
    pub fn empty(original_image_size: ImageSize) -> Self {
        Self {
            processing_time: 0.0,
            original_image_size,
            face_count: 0,
            faces: Vec::new(),
        }
    }

    pub fn has_faces(&self) -> bool {
        self.face_count > 0 && !self.faces.is_empty()
    }

    /// Lists every producer-side invariant this result breaks.
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        if self.face_count != self.faces.len() {
            out.push(InvariantViolation::FaceCountMismatch {
                declared: self.face_count,
                actual: self.faces.len(),
            });
        }
        for (i, face) in self.faces.iter().enumerate() {
            let b = &face.bbox;
            if b.x1 >= b.x2 || b.y1 >= b.y2 {
                out.push(InvariantViolation::InvertedBox { face: i });
            }
            if !approx_eq(face.width, b.width()) {
                out.push(InvariantViolation::WidthMismatch { face: i });
            }
            if !approx_eq(face.height, b.height()) {
                out.push(InvariantViolation::HeightMismatch { face: i });
            }
            if !approx_eq(face.area, face.width * face.height) {
                out.push(InvariantViolation::AreaMismatch { face: i });
            }
            if let Some(emotion) = &face.emotion {
                let top = emotion.all_emotions.argmax();
                let declared_score = emotion
                    .all_emotions
                    .iter()
                    .find(|(name, _)| *name == emotion.dominant_emotion)
                    .map(|(_, score)| score);
                let top_score = emotion
                    .all_emotions
                    .iter()
                    .find(|(name, _)| *name == top)
                    .map(|(_, score)| score);
                // Ties are fine as long as the declared name shares the max.
                if declared_score.is_none() || declared_score < top_score {
                    out.push(InvariantViolation::DominantEmotionNotMax {
                        face: i,
                        declared: emotion.dominant_emotion.clone(),
                    });
                }
            }
        }
        out
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= DERIVED_FIELD_EPSILON * a.abs().max(b.abs()).max(1.0)
}
