//! Detection normalization.
//!
//! Raw detector output arrives as parallel arrays in the detector's fixed
//! input resolution. This module maps it into `DetectedRoi` values in image
//! pixel coordinates, optionally keeping only vehicle classes.

mod labels;
mod normalize;
mod result;
mod source;

pub use labels::{LabelTable, COCO_CLASS_NAMES, DEFAULT_VEHICLE_LABELS};
pub use normalize::{DetectionNormalizer, DEFAULT_MODEL_INPUT};
pub use result::{BoxFormat, DetectedRoi, FrameDetections, FrameGeometry, RawDetectionBatch};
pub use source::{DetectionSource, ReplaySource};
