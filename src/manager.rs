//! Authoritative owner of the marked-region collection.
//!
//! `RegionManager` is the single writer. Every mutation publishes a fresh
//! `Arc` snapshot; readers holding an older snapshot never observe a partial
//! write. Multi-threaded hosts wrap the manager in a `Mutex` and hold the
//! lock only across `begin_cycle` and `apply_evaluation`, never across the
//! evaluation itself.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use uuid::Uuid;

use crate::geometry::Rectangle;
use crate::region::{rounded_area, MarkedRegion, RegionSnapshot, DEFAULT_REGION_LABEL};
use crate::{system_clock, Clock, RegionError};

/// Immutable view of the collection at one instant.
pub type RegionList = Arc<Vec<MarkedRegion>>;

/// Attempts at drawing a fresh identifier before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Ticket for one evaluation cycle.
#[derive(Clone, Debug)]
pub struct EvaluationCycle {
    pub id: u64,
    /// Regions as they were when the cycle began, all marked `evaluating`.
    pub regions: RegionList,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub cycle: u64,
    /// A newer cycle was already applied; nothing was written.
    pub stale: bool,
    /// Regions that received a classification.
    pub applied: usize,
    /// Regions whose occupancy value changed.
    pub changed: Vec<Uuid>,
    /// Regions in the cycle that got no classification and keep their state.
    pub unevaluated: usize,
    /// Results dropped because their region was deleted mid-cycle.
    pub discarded: usize,
}

pub struct RegionManager {
    regions: RegionList,
    rng: Box<dyn RngCore + Send>,
    clock: Clock,
    next_cycle: u64,
    last_applied_cycle: u64,
    in_flight: BTreeMap<u64, HashSet<Uuid>>,
    subscribers: Vec<Sender<RegionList>>,
}

impl RegionManager {
    pub fn new() -> Self {
        Self {
            regions: Arc::new(Vec::new()),
            rng: Box::new(StdRng::from_entropy()),
            clock: system_clock(),
            next_cycle: 1,
            last_applied_cycle: 0,
            in_flight: BTreeMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Replace the identifier generator.
    pub fn with_rng<R: RngCore + Send + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the wall clock used for event timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn snapshot(&self) -> RegionList {
        Arc::clone(&self.regions)
    }

    /// Receive every snapshot published after this call.
    pub fn subscribe(&mut self) -> Receiver<RegionList> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&MarkedRegion> {
        self.regions.iter().find(|r| &r.uuid == uuid)
    }

    fn contains(&self, uuid: &Uuid) -> bool {
        self.get(uuid).is_some()
    }

    fn publish(&mut self) {
        let snapshot = Arc::clone(&self.regions);
        self.subscribers
            .retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
    }

    fn generate_uuid(&mut self) -> Result<Uuid> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let mut bytes = [0u8; 16];
            self.rng.fill_bytes(&mut bytes);
            let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
            if !self.contains(&uuid) {
                return Ok(uuid);
            }
            log::warn!("generated region id {} already in use; retrying", uuid);
        }
        Err(RegionError::duplicate_identifier(format!(
            "no unique region id after {} attempts",
            MAX_ID_ATTEMPTS
        ))
        .into())
    }

    /// Add a region drawn by the user.
    ///
    /// The rectangle must be finite with positive width and height.
    pub fn create(&mut self, cords: Rectangle, label: Option<&str>) -> Result<MarkedRegion> {
        cords.validate_positive()?;
        let uuid = self.generate_uuid()?;
        let now = (self.clock)()?;
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_REGION_LABEL)
            .to_string();
        let region = MarkedRegion::new(uuid, cords, label, now);
        Arc::make_mut(&mut self.regions).push(region.clone());
        self.publish();
        log::debug!("created region {} ({} px)", region.uuid, region.area);
        Ok(region)
    }

    /// Remove one region. Returns false when no region had that id.
    pub fn delete_one(&mut self, uuid: &Uuid) -> bool {
        let Some(index) = self.regions.iter().position(|r| &r.uuid == uuid) else {
            return false;
        };
        Arc::make_mut(&mut self.regions).remove(index);
        self.publish();
        true
    }

    /// Remove every region. Confirmation is the caller's job.
    pub fn delete_all(&mut self) -> usize {
        let removed = self.regions.len();
        if removed > 0 {
            self.regions = Arc::new(Vec::new());
            self.publish();
        }
        removed
    }

    /// Toggle the pointer-hover flag. Never touches occupancy.
    pub fn set_hover(&mut self, uuid: &Uuid, hovering: bool) -> bool {
        let Some(index) = self.regions.iter().position(|r| &r.uuid == uuid) else {
            return false;
        };
        if self.regions[index].hover != hovering {
            Arc::make_mut(&mut self.regions)[index].hover = hovering;
            self.publish();
        }
        true
    }

    /// Replace the whole collection. Confirmation is the caller's job.
    ///
    /// Rejects sets with repeated ids or non-finite coordinates. Corners are
    /// reordered and the stored `area` of each region is recomputed from them.
    pub fn import_snapshot(&mut self, regions: Vec<MarkedRegion>) -> Result<()> {
        let mut seen = HashSet::with_capacity(regions.len());
        for region in &regions {
            if !seen.insert(region.uuid) {
                return Err(RegionError::duplicate_identifier(format!(
                    "snapshot contains region {} more than once",
                    region.uuid
                ))
                .into());
            }
            region.cords.validate()?;
        }

        let mut regions = regions;
        for region in &mut regions {
            region.cords = region.cords.normalized();
            region.area = rounded_area(&region.cords);
        }
        log::info!(
            "imported {} regions (replacing {})",
            regions.len(),
            self.regions.len()
        );
        self.regions = Arc::new(regions);
        self.publish();
        Ok(())
    }

    pub fn export_snapshot(&self) -> Result<RegionSnapshot> {
        Ok(RegionSnapshot {
            selected_regions: self.regions.as_ref().clone(),
            saved_date: (self.clock)()?,
        })
    }

    /// Start an evaluation cycle: mark every region as pending.
    pub fn begin_cycle(&mut self) -> EvaluationCycle {
        let id = self.next_cycle;
        self.next_cycle += 1;

        if self.regions.iter().any(|r| !r.evaluating) {
            for region in Arc::make_mut(&mut self.regions).iter_mut() {
                region.evaluating = true;
            }
        }
        self.in_flight
            .insert(id, self.regions.iter().map(|r| r.uuid).collect());
        self.publish();

        EvaluationCycle {
            id,
            regions: self.snapshot(),
        }
    }

    /// Write back the results of cycle `cycle_id`.
    ///
    /// Cycles are applied last-cycle-wins: results from a cycle older than
    /// one already applied are discarded. Results for regions deleted since
    /// the cycle began are dropped. Regions created after the cycle began
    /// are left untouched.
    pub fn apply_evaluation(
        &mut self,
        cycle_id: u64,
        results: &HashMap<Uuid, bool>,
    ) -> Result<ApplySummary> {
        let mut summary = ApplySummary {
            cycle: cycle_id,
            ..ApplySummary::default()
        };

        if cycle_id <= self.last_applied_cycle {
            log::debug!(
                "discarding results of cycle {} (cycle {} already applied)",
                cycle_id,
                self.last_applied_cycle
            );
            summary.stale = true;
            return Ok(summary);
        }
        let now = (self.clock)()?;
        let members = self
            .in_flight
            .remove(&cycle_id)
            .ok_or_else(|| anyhow!("evaluation cycle {} was never started", cycle_id))?;

        self.last_applied_cycle = cycle_id;
        self.in_flight.retain(|id, _| *id > cycle_id);
        let still_pending: HashSet<Uuid> = self.in_flight.values().flatten().copied().collect();

        let regions = Arc::make_mut(&mut self.regions);
        let mut present = HashSet::with_capacity(regions.len());
        for region in regions.iter_mut() {
            if !members.contains(&region.uuid) {
                continue;
            }
            present.insert(region.uuid);
            match results.get(&region.uuid) {
                Some(&occupied) => {
                    summary.applied += 1;
                    if region.record_classification(occupied, now) {
                        summary.changed.push(region.uuid);
                    }
                }
                None => summary.unevaluated += 1,
            }
            region.evaluating = still_pending.contains(&region.uuid);
        }

        summary.discarded = results.keys().filter(|id| !present.contains(*id)).count();
        if summary.discarded > 0 {
            log::debug!(
                "cycle {}: dropped {} results for deleted regions",
                cycle_id,
                summary.discarded
            );
        }
        self.publish();
        Ok(summary)
    }
}

impl Default for RegionManager {
    fn default() -> Self {
        Self::new()
    }
}
