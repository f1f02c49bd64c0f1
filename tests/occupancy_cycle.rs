use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Result;

use parking_occupancy::{
    overlap, DetectedRoi, EventName, FrameDetections, FrameGeometry, InMemorySnapshotStore,
    OccupancyPipeline, OverlapEvaluator, RawDetectionBatch, Rectangle, RegionManager,
};

fn detection(cords: Rectangle) -> DetectedRoi {
    DetectedRoi::new(cords, 0.9, "car")
}

fn occupied_after_one_cycle(region: Rectangle, detections: &[DetectedRoi]) -> Result<Option<bool>> {
    let mut manager = RegionManager::new();
    let created = manager.create(region, None)?;
    let cycle = manager.begin_cycle();
    let report = OverlapEvaluator::default().evaluate(&cycle.regions, detections);
    manager.apply_evaluation(cycle.id, &report.results)?;
    Ok(manager.get(&created.uuid).and_then(|r| r.occupied))
}

#[test]
fn identical_detection_occupies_region() -> Result<()> {
    let space = Rectangle::new(0.0, 0.0, 10.0, 10.0);
    let car = detection(Rectangle::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(occupied_after_one_cycle(space, &[car])?, Some(true));
    Ok(())
}

#[test]
fn distant_detection_leaves_region_available() -> Result<()> {
    let space = Rectangle::new(0.0, 0.0, 10.0, 10.0);
    let car = detection(Rectangle::new(20.0, 20.0, 30.0, 30.0));
    assert_eq!(occupied_after_one_cycle(space, &[car])?, Some(false));
    Ok(())
}

#[test]
fn coverage_must_strictly_exceed_threshold() -> Result<()> {
    let space = Rectangle::new(0.0, 0.0, 10.0, 10.0);

    let forty_one = detection(Rectangle::new(0.0, 0.0, 4.1, 10.0));
    assert_eq!(occupied_after_one_cycle(space, &[forty_one])?, Some(true));

    let forty = detection(Rectangle::new(0.0, 0.0, 4.0, 10.0));
    assert_eq!(occupied_after_one_cycle(space, &[forty])?, Some(false));

    let big_space = Rectangle::new(0.0, 0.0, 100.0, 100.0);
    let just_over = detection(Rectangle::new(0.0, 0.0, 40.01, 100.0));
    assert_eq!(occupied_after_one_cycle(big_space, &[just_over])?, Some(true));
    Ok(())
}

#[test]
fn contained_region_is_occupied_at_any_threshold() -> Result<()> {
    let mut manager = RegionManager::new();
    let space = manager.create(Rectangle::new(10.0, 10.0, 20.0, 20.0), None)?;
    let truck = detection(Rectangle::new(0.0, 0.0, 100.0, 100.0));

    let strict = OverlapEvaluator::new(1.0)?;
    let report = strict.evaluate(&manager.snapshot(), &[truck]);
    assert_eq!(report.results.get(&space.uuid), Some(&true));
    Ok(())
}

#[test]
fn no_overlap_when_strictly_apart() {
    let a = Rectangle::new(0.0, 0.0, 10.0, 10.0);
    let b = Rectangle::new(25.0, 0.0, 35.0, 10.0);
    assert!(overlap(&a, &b).is_none());
    assert!(overlap(&b, &a).is_none());
}

#[test]
fn created_ids_are_distinct() -> Result<()> {
    let mut manager = RegionManager::new();
    let mut ids = HashSet::new();
    for i in 0..500 {
        let x = f64::from(i) * 2.0;
        let region = manager.create(Rectangle::new(x, 0.0, x + 1.0, 1.0), None)?;
        ids.insert(region.uuid);
    }
    assert_eq!(ids.len(), 500);
    Ok(())
}

#[test]
fn exported_snapshot_restores_ids_and_corners() -> Result<()> {
    let mut source = RegionManager::new();
    source.create(Rectangle::new(0.0, 0.0, 10.0, 10.0), None)?;
    source.create(Rectangle::new(12.5, 3.0, 40.0, 19.75), Some("compact"))?;
    let exported = source.export_snapshot()?;

    let json = serde_json::to_string(&exported)?;
    let decoded: parking_occupancy::RegionSnapshot = serde_json::from_str(&json)?;

    let mut target = RegionManager::new();
    target.import_snapshot(decoded.selected_regions)?;

    let before: Vec<_> = source.snapshot().iter().map(|r| (r.uuid, r.cords)).collect();
    let after: Vec<_> = target.snapshot().iter().map(|r| (r.uuid, r.cords)).collect();
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn store_restores_state_between_sessions() -> Result<()> {
    let pipeline = OccupancyPipeline::default();
    let mut store = InMemorySnapshotStore::new();

    let mut first = RegionManager::new();
    let space = first.create(Rectangle::new(100.0, 100.0, 200.0, 200.0), None)?;
    let frame = FrameDetections {
        batch: RawDetectionBatch {
            boxes: vec![[75.0, 75.0, 50.0, 50.0]],
            scores: vec![0.8],
            class_indices: vec![2],
        },
        frame: FrameGeometry {
            image_width: 1280,
            image_height: 1280,
            model_input_width: Some(640),
            model_input_height: Some(640),
        },
    };
    let summary = pipeline.run_cycle(&mut first, &frame)?;
    assert_eq!(summary.occupied, 1);
    parking_occupancy::save_manager(&first, &mut store)?;

    let mut second = RegionManager::new();
    parking_occupancy::restore_manager(&mut second, &mut store)?;
    let restored = second.get(&space.uuid).expect("restored region");
    assert_eq!(restored.occupied, Some(true));
    let names: Vec<EventName> = restored.events.iter().map(|e| e.event_name).collect();
    assert_eq!(names, vec![EventName::Initialized, EventName::Occupied]);
    Ok(())
}

#[test]
fn delete_during_evaluation_discards_that_result() -> Result<()> {
    let manager = Arc::new(Mutex::new(RegionManager::new()));
    let (kept, doomed) = {
        let mut m = manager.lock().unwrap();
        let kept = m.create(Rectangle::new(0.0, 0.0, 10.0, 10.0), None)?;
        let doomed = m.create(Rectangle::new(20.0, 0.0, 30.0, 10.0), None)?;
        (kept, doomed)
    };

    let cycle = manager.lock().unwrap().begin_cycle();
    let detections = vec![
        detection(Rectangle::new(0.0, 0.0, 10.0, 10.0)),
        detection(Rectangle::new(20.0, 0.0, 30.0, 10.0)),
    ];
    let regions = Arc::clone(&cycle.regions);
    let worker = thread::spawn(move || OverlapEvaluator::default().evaluate(&regions, &detections));

    assert!(manager.lock().unwrap().delete_one(&doomed.uuid));

    let report = worker.join().expect("evaluation thread");
    assert_eq!(report.occupied_count(), 2);
    let summary = manager
        .lock()
        .unwrap()
        .apply_evaluation(cycle.id, &report.results)?;
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.discarded, 1);

    let m = manager.lock().unwrap();
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(&kept.uuid).and_then(|r| r.occupied), Some(true));
    Ok(())
}

#[test]
fn readers_keep_their_snapshot_while_cycles_apply() -> Result<()> {
    let mut manager = RegionManager::new();
    let space = manager.create(Rectangle::new(0.0, 0.0, 10.0, 10.0), None)?;
    let rx = manager.subscribe();

    let reader = thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(snapshot) = rx.recv() {
            seen.push(snapshot);
        }
        seen
    });

    let held = manager.snapshot();
    let cycle = manager.begin_cycle();
    let report = OverlapEvaluator::default().evaluate(
        &cycle.regions,
        &[detection(Rectangle::new(0.0, 0.0, 10.0, 10.0))],
    );
    manager.apply_evaluation(cycle.id, &report.results)?;
    drop(manager);

    let seen = reader.join().expect("reader thread");
    assert_eq!(seen.len(), 2);
    assert!(seen[0][0].evaluating);
    assert_eq!(seen[1][0].occupied, Some(true));
    assert_eq!(held[0].uuid, space.uuid);
    assert_eq!(held[0].occupied, None);
    Ok(())
}
