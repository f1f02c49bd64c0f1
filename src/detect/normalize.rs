use anyhow::{anyhow, Result};

use crate::detect::labels::LabelTable;
use crate::detect::result::{BoxFormat, DetectedRoi, FrameDetections, FrameGeometry, RawDetectionBatch};
use crate::geometry::Rectangle;

/// Converts raw detector output into `DetectedRoi` values in image pixels.
///
/// Stateless across frames: every call depends only on its arguments.
#[derive(Clone, Debug)]
pub struct DetectionNormalizer {
    labels: LabelTable,
    box_format: BoxFormat,
    min_confidence: f64,
    model_input: (u32, u32),
}

/// Detector input resolution assumed when a frame does not state its own.
pub const DEFAULT_MODEL_INPUT: (u32, u32) = (640, 640);

impl DetectionNormalizer {
    pub fn new(labels: LabelTable) -> Self {
        Self {
            labels,
            box_format: BoxFormat::default(),
            min_confidence: 0.0,
            model_input: DEFAULT_MODEL_INPUT,
        }
    }

    /// Model input size used for frames that carry none.
    pub fn with_model_input(mut self, width: u32, height: u32) -> Self {
        self.model_input = (width, height);
        self
    }

    pub fn model_input(&self) -> (u32, u32) {
        self.model_input
    }

    pub fn with_box_format(mut self, box_format: BoxFormat) -> Self {
        self.box_format = box_format;
        self
    }

    /// Drop detections scoring below `min_confidence`.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn normalize_frame(
        &self,
        detections: &FrameDetections,
        vehicle_only: bool,
    ) -> Result<Vec<DetectedRoi>> {
        self.normalize(&detections.batch, &detections.frame, vehicle_only)
    }

    /// Normalize one batch.
    ///
    /// An empty batch yields an empty list. Individual malformed detections
    /// are skipped and logged; only an unusable frame geometry is an error.
    pub fn normalize(
        &self,
        batch: &RawDetectionBatch,
        frame: &FrameGeometry,
        vehicle_only: bool,
    ) -> Result<Vec<DetectedRoi>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let model_w = frame.model_input_width.unwrap_or(self.model_input.0);
        let model_h = frame.model_input_height.unwrap_or(self.model_input.1);
        if model_w == 0 || model_h == 0 {
            return Err(anyhow!(
                "model input size {}x{} must be non-zero",
                model_w,
                model_h
            ));
        }
        if batch.is_ragged() {
            log::warn!(
                "detection batch is ragged (boxes={}, scores={}, classes={}); using first {}",
                batch.boxes.len(),
                batch.scores.len(),
                batch.class_indices.len(),
                batch.len()
            );
        }

        let scale_x = frame.image_width as f64 / model_w as f64;
        let scale_y = frame.image_height as f64 / model_h as f64;

        let mut out = Vec::with_capacity(batch.len());
        for i in 0..batch.len() {
            let class_index = batch.class_indices[i];
            let Some(label) = self.labels.label_for(class_index) else {
                log::warn!("skipping detection {}: unknown class index {}", i, class_index);
                continue;
            };
            if vehicle_only && !self.labels.is_vehicle(label) {
                continue;
            }

            let score = batch.scores[i];
            if !score.is_finite() {
                log::warn!("skipping detection {}: non-finite score", i);
                continue;
            }
            if score < self.min_confidence {
                continue;
            }

            let raw = batch.boxes[i];
            if raw.iter().any(|v| !v.is_finite()) {
                log::warn!("skipping detection {}: non-finite box {:?}", i, raw);
                continue;
            }

            let (x1, y1, x2, y2) = self.box_format.to_corners(raw);
            let cords = Rectangle::new(x1 * scale_x, y1 * scale_y, x2 * scale_x, y2 * scale_y)
                .normalized();
            out.push(DetectedRoi::new(cords, score, label));
        }

        log::debug!(
            "normalized {} of {} detections (vehicle_only={})",
            out.len(),
            batch.len(),
            vehicle_only
        );
        Ok(out)
    }
}

impl Default for DetectionNormalizer {
    fn default() -> Self {
        Self::new(LabelTable::default())
    }
}
