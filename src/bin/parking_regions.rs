//! parking_regions - manage marked parking spaces and run occupancy cycles

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use parking_occupancy::store::{restore_manager, save_manager};
use parking_occupancy::{
    FileSnapshotStore, OccupancyConfig, OccupancyPipeline, Rectangle, RegionManager, ReplaySource,
    SnapshotStore, Uuid,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every marked region with its occupancy state.
    List,
    /// Mark a new parking space (corners in image pixels, any order).
    Create {
        #[arg(long, allow_negative_numbers = true)]
        left: f64,
        #[arg(long, allow_negative_numbers = true)]
        top: f64,
        #[arg(long, allow_negative_numbers = true)]
        right: f64,
        #[arg(long, allow_negative_numbers = true)]
        bottom: f64,
        /// Region label.
        #[arg(long)]
        label: Option<String>,
    },
    /// Delete one region by uuid.
    Delete { uuid: Uuid },
    /// Delete every region.
    Clear {
        /// Confirm the destructive overwrite.
        #[arg(long)]
        yes: bool,
    },
    /// Replace all regions with a saved snapshot file.
    Import {
        file: PathBuf,
        /// Confirm replacing a non-empty collection.
        #[arg(long)]
        yes: bool,
    },
    /// Write the current regions to a snapshot file.
    Export { file: PathBuf },
    /// Replay recorded detections and update occupancy.
    Evaluate {
        /// JSON array of frames: [{"batch": {...}, "frame": {...}}, ...]
        #[arg(long)]
        detections: PathBuf,
        /// Override the configured overlap threshold.
        #[arg(long)]
        threshold: Option<f64>,
        /// Count every detected class, not only vehicles.
        #[arg(long)]
        all_classes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = OccupancyConfig::load()?;
    let mut store = cfg.open_store()?;
    let mut manager = RegionManager::new();
    let restored = restore_manager(&mut manager, store.as_mut())?;
    log::info!(
        "loaded {} regions from {}",
        restored,
        cfg.store.path.display()
    );

    match args.command {
        Command::List => {
            print_regions(&manager);
            return Ok(());
        }
        Command::Create {
            left,
            top,
            right,
            bottom,
            label,
        } => {
            let cords = Rectangle::from_points((left, top), (right, bottom));
            let region = manager.create(cords, label.as_deref())?;
            println!("created {} ({} px)", region.uuid, region.area);
        }
        Command::Delete { uuid } => {
            if !manager.delete_one(&uuid) {
                println!("no region {}", uuid);
                return Ok(());
            }
            println!("deleted {}", uuid);
        }
        Command::Clear { yes } => {
            if manager.is_empty() {
                println!("no regions to delete");
                return Ok(());
            }
            if !yes {
                return Err(anyhow!(
                    "refusing to delete {} regions without --yes",
                    manager.len()
                ));
            }
            println!("deleted {} regions", manager.delete_all());
        }
        Command::Import { file, yes } => {
            if !manager.is_empty() && !yes {
                return Err(anyhow!(
                    "refusing to replace {} existing regions without --yes",
                    manager.len()
                ));
            }
            let snapshot = FileSnapshotStore::new(&file)
                .load()?
                .ok_or_else(|| anyhow!("snapshot {} does not exist", file.display()))?;
            let count = snapshot.selected_regions.len();
            manager.import_snapshot(snapshot.selected_regions)?;
            println!("imported {} regions", count);
        }
        Command::Export { file } => {
            let snapshot = save_manager(&manager, &mut FileSnapshotStore::new(&file))?;
            println!(
                "exported {} regions to {}",
                snapshot.selected_regions.len(),
                file.display()
            );
            return Ok(());
        }
        Command::Evaluate {
            detections,
            threshold,
            all_classes,
        } => {
            if let Some(threshold) = threshold {
                cfg.overlap_threshold = threshold;
            }
            if all_classes {
                cfg.vehicle_only = false;
            }
            let pipeline = OccupancyPipeline::from_config(&cfg)?;
            let mut source = ReplaySource::from_path(&detections)?;
            let summaries = pipeline.run_source(&mut manager, &mut source)?;
            for summary in &summaries {
                println!(
                    "cycle {}: {} detections, {} occupied, {} available, {} unevaluated, {} changed",
                    summary.cycle,
                    summary.detections,
                    summary.occupied,
                    summary.available,
                    summary.unevaluated,
                    summary.changed.len()
                );
            }
            print_regions(&manager);
        }
    }

    save_manager(&manager, store.as_mut())?;
    log::info!("saved {} regions", manager.len());
    Ok(())
}

fn print_regions(manager: &RegionManager) {
    if manager.is_empty() {
        println!("no regions");
        return;
    }
    for region in manager.snapshot().iter() {
        let state = match region.occupied {
            Some(true) => "occupied",
            Some(false) => "available",
            None => "unknown",
        };
        println!(
            "{}  {:<10} {:>9}  [{}, {}] -> [{}, {}]  cycles={}",
            region.uuid,
            region.label,
            state,
            region.cords.left_x,
            region.cords.top_y,
            region.cords.right_x,
            region.cords.bottom_y,
            region.cycle_count
        );
    }
}
