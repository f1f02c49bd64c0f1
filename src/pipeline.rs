//! One evaluation cycle: normalize -> evaluate -> apply.

use anyhow::Result;
use uuid::Uuid;

use crate::config::OccupancyConfig;
use crate::detect::{DetectionNormalizer, DetectionSource, FrameDetections, LabelTable};
use crate::evaluate::OverlapEvaluator;
use crate::manager::RegionManager;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycle: u64,
    /// Detections that survived normalization and filtering.
    pub detections: usize,
    pub occupied: usize,
    pub available: usize,
    pub unevaluated: usize,
    /// Regions whose occupancy value changed this cycle.
    pub changed: Vec<Uuid>,
}

pub struct OccupancyPipeline {
    normalizer: DetectionNormalizer,
    evaluator: OverlapEvaluator,
    vehicle_only: bool,
}

impl OccupancyPipeline {
    pub fn new(
        normalizer: DetectionNormalizer,
        evaluator: OverlapEvaluator,
        vehicle_only: bool,
    ) -> Self {
        Self {
            normalizer,
            evaluator,
            vehicle_only,
        }
    }

    pub fn from_config(cfg: &OccupancyConfig) -> Result<Self> {
        let labels = LabelTable::new(cfg.class_names.clone(), cfg.vehicle_labels.clone())?;
        let normalizer = DetectionNormalizer::new(labels)
            .with_box_format(cfg.box_format)
            .with_min_confidence(cfg.min_confidence)
            .with_model_input(cfg.model_input_width, cfg.model_input_height);
        let evaluator = OverlapEvaluator::new(cfg.overlap_threshold)?;
        Ok(Self::new(normalizer, evaluator, cfg.vehicle_only))
    }

    pub fn evaluator(&self) -> &OverlapEvaluator {
        &self.evaluator
    }

    /// Run a full cycle for one frame against the manager's regions.
    ///
    /// Detections are normalized before the cycle begins, so a frame with
    /// unusable geometry leaves every region untouched.
    pub fn run_cycle(
        &self,
        manager: &mut RegionManager,
        frame: &FrameDetections,
    ) -> Result<CycleSummary> {
        let detections = self.normalizer.normalize_frame(frame, self.vehicle_only)?;
        let cycle = manager.begin_cycle();
        let report = self.evaluator.evaluate(&cycle.regions, &detections);
        let applied = manager.apply_evaluation(cycle.id, &report.results)?;

        let summary = CycleSummary {
            cycle: cycle.id,
            detections: detections.len(),
            occupied: report.occupied_count(),
            available: report.available_count(),
            unevaluated: report.unevaluated.len(),
            changed: applied.changed,
        };
        log::debug!(
            "cycle {}: {} detections, {} occupied, {} available, {} unevaluated",
            summary.cycle,
            summary.detections,
            summary.occupied,
            summary.available,
            summary.unevaluated
        );
        Ok(summary)
    }

    /// Drain a detection source, running one cycle per frame.
    pub fn run_source(
        &self,
        manager: &mut RegionManager,
        source: &mut dyn DetectionSource,
    ) -> Result<Vec<CycleSummary>> {
        let mut summaries = Vec::new();
        while let Some(frame) = source.next_frame()? {
            summaries.push(self.run_cycle(manager, &frame)?);
        }
        log::info!("{}: processed {} frames", source.name(), summaries.len());
        Ok(summaries)
    }
}

impl Default for OccupancyPipeline {
    fn default() -> Self {
        Self::new(DetectionNormalizer::default(), OverlapEvaluator::default(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{FrameGeometry, RawDetectionBatch, ReplaySource};
    use crate::geometry::Rectangle;
    use crate::region::EventName;

    fn frame(boxes: Vec<[f64; 4]>, classes: Vec<usize>) -> FrameDetections {
        FrameDetections {
            batch: RawDetectionBatch {
                scores: vec![0.9; boxes.len()],
                boxes,
                class_indices: classes,
            },
            frame: FrameGeometry {
                image_width: 640,
                image_height: 640,
                model_input_width: Some(640),
                model_input_height: Some(640),
            },
        }
    }

    #[test]
    fn car_over_space_marks_it_occupied() -> Result<()> {
        let pipeline = OccupancyPipeline::default();
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(100.0, 100.0, 200.0, 200.0), None)?;
        let other = manager.create(Rectangle::new(400.0, 400.0, 500.0, 500.0), None)?;

        // a car centred on the first space
        let car = frame(vec![[150.0, 150.0, 100.0, 100.0]], vec![2]);
        let summary = pipeline.run_cycle(&mut manager, &car)?;
        assert_eq!(summary.detections, 1);
        assert_eq!(summary.occupied, 1);
        assert_eq!(summary.available, 1);
        assert_eq!(summary.changed.len(), 2);
        assert_eq!(manager.get(&space.uuid).unwrap().occupied, Some(true));
        assert_eq!(manager.get(&other.uuid).unwrap().occupied, Some(false));
        Ok(())
    }

    #[test]
    fn non_vehicles_are_ignored_when_filtering() -> Result<()> {
        let pipeline = OccupancyPipeline::default();
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(100.0, 100.0, 200.0, 200.0), None)?;

        // a person standing in the space
        let person = frame(vec![[150.0, 150.0, 100.0, 100.0]], vec![0]);
        let summary = pipeline.run_cycle(&mut manager, &person)?;
        assert_eq!(summary.detections, 0);
        assert_eq!(manager.get(&space.uuid).unwrap().occupied, Some(false));
        Ok(())
    }

    #[test]
    fn replayed_frames_track_arrival_and_departure() -> Result<()> {
        let pipeline = OccupancyPipeline::default();
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(100.0, 100.0, 200.0, 200.0), None)?;

        let mut source = ReplaySource::new(vec![
            frame(vec![], vec![]),
            frame(vec![[150.0, 150.0, 100.0, 100.0]], vec![7]),
            frame(vec![[150.0, 150.0, 100.0, 100.0]], vec![7]),
            frame(vec![], vec![]),
        ]);
        let summaries = pipeline.run_source(&mut manager, &mut source)?;
        assert_eq!(summaries.len(), 4);

        let region = manager.get(&space.uuid).unwrap();
        assert_eq!(region.occupied, Some(false));
        assert_eq!(region.cycle_count, 4);
        let names: Vec<EventName> = region.events.iter().map(|e| e.event_name).collect();
        assert_eq!(
            names,
            vec![
                EventName::Initialized,
                EventName::Available,
                EventName::Occupied,
                EventName::Available
            ]
        );
        Ok(())
    }

    #[test]
    fn configured_model_input_drives_scaling() -> Result<()> {
        let cfg = OccupancyConfig {
            model_input_width: 320,
            model_input_height: 320,
            ..OccupancyConfig::default()
        };
        let pipeline = OccupancyPipeline::from_config(&cfg)?;
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(150.0, 150.0, 250.0, 250.0), None)?;

        let car = FrameDetections {
            batch: RawDetectionBatch {
                boxes: vec![[100.0, 100.0, 50.0, 50.0]],
                scores: vec![0.9],
                class_indices: vec![2],
            },
            frame: FrameGeometry::new(640, 640),
        };
        pipeline.run_cycle(&mut manager, &car)?;
        assert_eq!(manager.get(&space.uuid).unwrap().occupied, Some(true));

        let default_pipeline = OccupancyPipeline::default();
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(150.0, 150.0, 250.0, 250.0), None)?;
        default_pipeline.run_cycle(&mut manager, &car)?;
        assert_eq!(manager.get(&space.uuid).unwrap().occupied, Some(false));
        Ok(())
    }

    #[test]
    fn bad_frame_geometry_leaves_regions_untouched() -> Result<()> {
        let pipeline = OccupancyPipeline::default();
        let mut manager = RegionManager::new();
        let space = manager.create(Rectangle::new(100.0, 100.0, 200.0, 200.0), None)?;

        let mut bad = frame(vec![[150.0, 150.0, 100.0, 100.0]], vec![2]);
        bad.frame.model_input_width = Some(0);
        assert!(pipeline.run_cycle(&mut manager, &bad).is_err());
        assert_eq!(manager.get(&space.uuid).unwrap().cycle_count, 0);
        Ok(())
    }
}
