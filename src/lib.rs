//! Parking Occupancy Engine
//!
//! This crate decides whether user-marked parking spaces are occupied by
//! vehicles found in a camera frame.
//!
//! # Architecture
//!
//! One evaluation cycle flows strictly in sequence:
//!
//! 1. **Normalize**: raw model detections (boxes in model-input space) become
//!    `DetectedRoi` values in image pixel space (`detect`).
//! 2. **Evaluate**: every marked region is tested against every detected ROI
//!    for geometric overlap (`evaluate`).
//! 3. **Apply**: occupancy flags, event history and bookkeeping are written
//!    back into the authoritative region list (`manager`).
//!
//! # Module Structure
//!
//! - `geometry`: Rectangle model and pure overlap math
//! - `detect`: label tables, raw batches, normalizer, replay sources
//! - `region`: MarkedRegion, RegionEvent, RegionSnapshot
//! - `evaluate`: OverlapEvaluator
//! - `manager`: RegionManager (single writer, snapshot publishing)
//! - `pipeline`: OccupancyPipeline (one full cycle)
//! - `store`: snapshot persistence (memory, JSON file, SQLite)
//! - `config`: file + environment configuration

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod detect;
pub mod evaluate;
pub mod geometry;
pub mod manager;
pub mod pipeline;
pub mod region;
pub mod store;

pub use config::{OccupancyConfig, StoreKind, StoreSettings};
pub use detect::{
    BoxFormat, DetectedRoi, DetectionNormalizer, DetectionSource, FrameDetections, FrameGeometry,
    LabelTable, RawDetectionBatch, ReplaySource,
};
pub use evaluate::{Classification, EvaluationReport, OverlapEvaluator, DEFAULT_OVERLAP_THRESHOLD};
pub use geometry::{area, dimensions, overlap, signed_lines, Dimensions, Rectangle, SignedLines};
pub use manager::{ApplySummary, EvaluationCycle, RegionList, RegionManager};
pub use pipeline::{CycleSummary, OccupancyPipeline};
pub use region::{EventName, MarkedRegion, RegionEvent, RegionSnapshot, DEFAULT_REGION_LABEL};
pub use store::{
    restore_manager, save_manager, FileSnapshotStore, InMemorySnapshotStore, SnapshotStore,
    SqliteSnapshotStore,
};
pub use uuid::Uuid;

// -------------------- Errors --------------------

/// Failure classes callers are expected to tell apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-positive extent or non-finite coordinates.
    InvalidRegion,
    /// A region identifier collided with one already in the collection.
    DuplicateIdentifier,
}

/// Typed error carried inside `anyhow::Error`.
///
/// Recover the kind with `err.downcast_ref::<RegionError>()`.
#[derive(Clone, Debug)]
pub struct RegionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RegionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_region(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRegion, message)
    }

    pub fn duplicate_identifier(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateIdentifier, message)
    }
}

impl std::fmt::Display for RegionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RegionError {}

/// Returns the `ErrorKind` of an `anyhow::Error` when it wraps a `RegionError`.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<RegionError>().map(|e| e.kind)
}

// -------------------- Time --------------------

/// Source of wall-clock timestamps in epoch milliseconds.
pub type Clock = Box<dyn Fn() -> Result<u64> + Send>;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> Result<u64> {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    Ok(u64::try_from(millis)?)
}

pub fn system_clock() -> Clock {
    Box::new(now_ms)
}
