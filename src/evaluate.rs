//! Overlap evaluation: decides which marked regions are occupied.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use uuid::Uuid;

use crate::detect::DetectedRoi;
use crate::geometry::overlap;
use crate::region::MarkedRegion;

/// Fraction of a region that must be covered to count as occupied.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Occupied,
    Available,
    /// The region itself is malformed; it keeps its previous state.
    Unevaluated,
}

/// Outcome of evaluating every region against one frame's detections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationReport {
    /// uuid -> occupied, for every region that reached a decision
    pub results: HashMap<Uuid, bool>,
    pub unevaluated: Vec<Uuid>,
}

impl EvaluationReport {
    pub fn occupied_count(&self) -> usize {
        self.results.values().filter(|occupied| **occupied).count()
    }

    pub fn available_count(&self) -> usize {
        self.results.len() - self.occupied_count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapEvaluator {
    threshold: f64,
}

impl OverlapEvaluator {
    /// `threshold` must lie in `(0, 1]`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
            return Err(anyhow!(
                "overlap threshold must be in (0, 1], got {}",
                threshold
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify one region against all detections.
    ///
    /// Any single detection covering the whole region, or strictly more than
    /// `threshold` of it, makes the region occupied, so detection order never
    /// changes the result. Zero-area regions are always available. A
    /// malformed detection is skipped for this pair only.
    pub fn classify(&self, region: &MarkedRegion, detections: &[DetectedRoi]) -> Classification {
        if let Err(err) = region.cords.validate() {
            log::warn!("region {} not evaluated: {}", region.uuid, err);
            return Classification::Unevaluated;
        }
        let marked_area = region.area.round();
        if !marked_area.is_finite() {
            log::warn!("region {} not evaluated: non-finite area", region.uuid);
            return Classification::Unevaluated;
        }
        if marked_area <= 0.0 {
            return Classification::Available;
        }

        for (i, detection) in detections.iter().enumerate() {
            if let Err(err) = detection.cords.validate() {
                log::warn!(
                    "skipping detection {} for region {}: {}",
                    i,
                    region.uuid,
                    err
                );
                continue;
            }
            let Some(intersection) = overlap(&detection.cords, &region.cords) else {
                continue;
            };
            let intersection_area = intersection.area().round();
            if intersection_area == marked_area {
                return Classification::Occupied;
            }
            if intersection_area / marked_area > self.threshold {
                return Classification::Occupied;
            }
        }

        Classification::Available
    }

    pub fn evaluate(&self, regions: &[MarkedRegion], detections: &[DetectedRoi]) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        for region in regions {
            match self.classify(region, detections) {
                Classification::Occupied => {
                    report.results.insert(region.uuid, true);
                }
                Classification::Available => {
                    report.results.insert(region.uuid, false);
                }
                Classification::Unevaluated => report.unevaluated.push(region.uuid),
            }
        }
        report
    }
}

impl Default for OverlapEvaluator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;
    use crate::region::DEFAULT_REGION_LABEL;

    fn region(id: u128, cords: Rectangle) -> MarkedRegion {
        MarkedRegion::new(
            Uuid::from_u128(id),
            cords,
            DEFAULT_REGION_LABEL.to_string(),
            0,
        )
    }

    fn car(cords: Rectangle) -> DetectedRoi {
        DetectedRoi::new(cords, 0.9, "car")
    }

    fn space() -> MarkedRegion {
        region(1, Rectangle::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn identical_box_is_occupied() {
        let evaluator = OverlapEvaluator::default();
        let detections = [car(Rectangle::new(0.0, 0.0, 10.0, 10.0))];
        assert_eq!(
            evaluator.classify(&space(), &detections),
            Classification::Occupied
        );
    }

    #[test]
    fn disjoint_box_is_available() {
        let evaluator = OverlapEvaluator::default();
        let detections = [car(Rectangle::new(20.0, 20.0, 30.0, 30.0))];
        assert_eq!(
            evaluator.classify(&space(), &detections),
            Classification::Available
        );
        assert_eq!(evaluator.classify(&space(), &[]), Classification::Available);
    }

    #[test]
    fn threshold_is_strict() {
        let evaluator = OverlapEvaluator::default();
        // 4.1 x 10 = 41 of 100
        let over = [car(Rectangle::new(5.9, 0.0, 20.0, 10.0))];
        assert_eq!(evaluator.classify(&space(), &over), Classification::Occupied);
        // 4 x 10 = 40 of 100
        let at = [car(Rectangle::new(6.0, 0.0, 20.0, 10.0))];
        assert_eq!(evaluator.classify(&space(), &at), Classification::Available);
    }

    #[test]
    fn just_above_threshold_on_a_large_region() {
        let evaluator = OverlapEvaluator::default();
        let big = region(2, Rectangle::new(0.0, 0.0, 100.0, 100.0));
        // 4001 of 10000
        let hit = [car(Rectangle::new(0.0, 0.0, 40.01, 100.0))];
        assert_eq!(evaluator.classify(&big, &hit), Classification::Occupied);
        let exact = [car(Rectangle::new(0.0, 0.0, 40.0, 100.0))];
        assert_eq!(evaluator.classify(&big, &exact), Classification::Available);
    }

    #[test]
    fn full_containment_wins_at_any_threshold() {
        let evaluator = OverlapEvaluator::new(1.0).unwrap();
        let detections = [car(Rectangle::new(-50.0, -50.0, 200.0, 200.0))];
        assert_eq!(
            evaluator.classify(&space(), &detections),
            Classification::Occupied
        );
    }

    #[test]
    fn zero_area_region_is_never_occupied() {
        let evaluator = OverlapEvaluator::default();
        let flat = region(3, Rectangle::new(0.0, 0.0, 10.0, 0.0));
        let detections = [car(Rectangle::new(-5.0, -5.0, 50.0, 50.0))];
        assert_eq!(evaluator.classify(&flat, &detections), Classification::Available);
    }

    #[test]
    fn detection_order_does_not_matter() {
        let evaluator = OverlapEvaluator::default();
        let mut detections = vec![
            car(Rectangle::new(20.0, 20.0, 30.0, 30.0)),
            car(Rectangle::new(8.0, 0.0, 18.0, 10.0)),
            car(Rectangle::new(0.0, 0.0, 5.0, 10.0)),
        ];
        let forward = evaluator.classify(&space(), &detections);
        detections.reverse();
        let backward = evaluator.classify(&space(), &detections);
        assert_eq!(forward, Classification::Occupied);
        assert_eq!(forward, backward);
    }

    #[test]
    fn malformed_detection_is_skipped_per_pair() {
        let evaluator = OverlapEvaluator::default();
        let covered = space();
        let elsewhere = region(4, Rectangle::new(100.0, 100.0, 110.0, 110.0));
        let detections = [
            car(Rectangle::new(f64::NAN, 0.0, 10.0, 10.0)),
            car(Rectangle::new(0.0, 0.0, 10.0, 10.0)),
        ];

        let report = evaluator.evaluate(&[covered.clone(), elsewhere.clone()], &detections);
        assert_eq!(report.results.get(&covered.uuid), Some(&true));
        assert_eq!(report.results.get(&elsewhere.uuid), Some(&false));
        assert!(report.unevaluated.is_empty());
        assert_eq!(report.occupied_count(), 1);
        assert_eq!(report.available_count(), 1);

        let only_bad = [car(Rectangle::new(f64::NAN, 0.0, 10.0, 10.0))];
        assert_eq!(
            evaluator.classify(&elsewhere, &only_bad),
            Classification::Available
        );
    }

    #[test]
    fn malformed_region_is_unevaluated() {
        let evaluator = OverlapEvaluator::default();
        let mut bad = space();
        bad.cords.right_x = f64::INFINITY;
        assert_eq!(evaluator.classify(&bad, &[]), Classification::Unevaluated);
    }

    #[test]
    fn threshold_bounds_are_enforced() {
        assert!(OverlapEvaluator::new(0.0).is_err());
        assert!(OverlapEvaluator::new(1.5).is_err());
        assert!(OverlapEvaluator::new(f64::NAN).is_err());
        assert_eq!(OverlapEvaluator::new(0.4).unwrap().threshold(), 0.4);
    }
}
