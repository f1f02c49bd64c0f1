use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::manager::RegionManager;
use crate::region::RegionSnapshot;

/// Persistence for region snapshots.
pub trait SnapshotStore {
    /// Most recently saved snapshot, or `None` when nothing was saved yet.
    fn load(&mut self) -> Result<Option<RegionSnapshot>>;

    fn save(&mut self, snapshot: &RegionSnapshot) -> Result<()>;
}

/// Export the manager's regions into `store`.
pub fn save_manager(
    manager: &RegionManager,
    store: &mut dyn SnapshotStore,
) -> Result<RegionSnapshot> {
    let snapshot = manager.export_snapshot()?;
    store.save(&snapshot)?;
    Ok(snapshot)
}

/// Replace the manager's regions with the stored snapshot, if any.
///
/// Returns the number of regions restored.
pub fn restore_manager(
    manager: &mut RegionManager,
    store: &mut dyn SnapshotStore,
) -> Result<usize> {
    match store.load()? {
        Some(snapshot) => {
            let count = snapshot.selected_regions.len();
            manager.import_snapshot(snapshot.selected_regions)?;
            Ok(count)
        }
        None => Ok(0),
    }
}

#[derive(Default)]
pub struct InMemorySnapshotStore {
    latest: Option<RegionSnapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&mut self) -> Result<Option<RegionSnapshot>> {
        Ok(self.latest.clone())
    }

    fn save(&mut self, snapshot: &RegionSnapshot) -> Result<()> {
        self.latest = Some(snapshot.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document at a fixed path.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&mut self) -> Result<Option<RegionSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid snapshot {}: {}", self.path.display(), e))?;
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &RegionSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing snapshot {}", self.path.display()))?;
        Ok(())
    }
}

/// Append-only snapshot history in SQLite; `load` returns the newest row.
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS region_snapshots (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              saved_date INTEGER NOT NULL,
              region_count INTEGER NOT NULL,
              payload_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn history_len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM region_snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(count)?)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&mut self) -> Result<Option<RegionSnapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM region_snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(|e| anyhow!("corrupt snapshot row: {}", e))?,
            )),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &RegionSnapshot) -> Result<()> {
        let saved_date = i64::try_from(snapshot.saved_date)
            .map_err(|_| anyhow!("snapshot date exceeds i64 range"))?;
        let region_count = i64::try_from(snapshot.selected_regions.len())?;
        let payload_json = serde_json::to_string(snapshot)?;
        self.conn.execute(
            r#"
            INSERT INTO region_snapshots(saved_date, region_count, payload_json)
            VALUES (?1, ?2, ?3)
            "#,
            params![saved_date, region_count, payload_json],
        )?;
        Ok(())
    }
}
