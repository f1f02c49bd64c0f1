use serde::{Deserialize, Serialize};

use crate::geometry::Rectangle;

/// Raw per-frame model output as parallel arrays.
///
/// Boxes are in model-input coordinates; see `BoxFormat` for their layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetectionBatch {
    #[serde(default)]
    pub boxes: Vec<[f64; 4]>,
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub class_indices: Vec<usize>,
}

impl RawDetectionBatch {
    /// Number of complete detections (shortest of the parallel arrays).
    pub fn len(&self) -> usize {
        self.boxes
            .len()
            .min(self.scores.len())
            .min(self.class_indices.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parallel arrays disagree on length.
    pub fn is_ragged(&self) -> bool {
        self.boxes.len() != self.scores.len() || self.boxes.len() != self.class_indices.len()
    }
}

/// True frame size plus the fixed resolution the detector ran at.
///
/// A missing model input size falls back to the normalizer's configured one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameGeometry {
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_input_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_input_height: Option<u32>,
}

impl FrameGeometry {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            model_input_width: None,
            model_input_height: None,
        }
    }

    pub fn with_model_input(mut self, width: u32, height: u32) -> Self {
        self.model_input_width = Some(width);
        self.model_input_height = Some(height);
        self
    }
}

/// One frame worth of detector output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    #[serde(default)]
    pub batch: RawDetectionBatch,
    pub frame: FrameGeometry,
}

/// Layout of each raw `[a, b, c, d]` box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
    /// `[center_x, center_y, width, height]`
    #[default]
    Center,
    /// `[left_x, top_y, width, height]`
    TopLeft,
    /// `[x1, y1, x2, y2]`
    Corners,
}

impl BoxFormat {
    /// Two opposite corners `(x1, y1, x2, y2)` in the same coordinate space.
    pub fn to_corners(self, raw: [f64; 4]) -> (f64, f64, f64, f64) {
        let [a, b, c, d] = raw;
        match self {
            BoxFormat::Center => (a - c / 2.0, b - d / 2.0, a + c / 2.0, b + d / 2.0),
            BoxFormat::TopLeft => (a, b, a + c, b + d),
            BoxFormat::Corners => (a, b, c, d),
        }
    }
}

impl std::str::FromStr for BoxFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "center" | "xywh" => Ok(BoxFormat::Center),
            "top_left" | "top-left" | "ltwh" => Ok(BoxFormat::TopLeft),
            "corners" | "xyxy" => Ok(BoxFormat::Corners),
            other => Err(anyhow::anyhow!(
                "unknown box format '{}' (expected center|top_left|corners)",
                other
            )),
        }
    }
}

/// A detected object in image pixel coordinates.
///
/// Built fresh for each frame and never mutated. `area` is always derived
/// from `cords`; a stored value is ignored on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DetectedRoiRepr")]
pub struct DetectedRoi {
    pub cords: Rectangle,
    pub confidence_level: f64,
    pub label: String,
    pub area: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedRoiRepr {
    cords: Rectangle,
    confidence_level: f64,
    label: String,
}

impl From<DetectedRoiRepr> for DetectedRoi {
    fn from(repr: DetectedRoiRepr) -> Self {
        DetectedRoi::new(repr.cords, repr.confidence_level, repr.label)
    }
}

impl DetectedRoi {
    pub fn new(cords: Rectangle, confidence_level: f64, label: impl Into<String>) -> Self {
        Self {
            area: cords.width() * cords.height(),
            cords,
            confidence_level,
            label: label.into(),
        }
    }
}
