//! Restartable world snapshots.
//!
//! A [`WorldSnapshot`] captures everything mutable at a tick boundary:
//! every agent's store and working state, the occupancy grid, and the
//! tick counter. Restoring one yields a structurally identical world —
//! same node ids, ordering, and scores. Snapshots travel either as
//! compact bincode bytes or through a SQLite store:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS snapshots (
//!     tick     INTEGER PRIMARY KEY,
//!     run_id   TEXT NOT NULL,
//!     data     BLOB NOT NULL,
//!     saved_at TEXT NOT NULL,
//!     checksum TEXT
//! );
//! ```
//!
//! JSON inside a BLOB column keeps the schema stable as state types
//! evolve; an optional CRC-32 detects corruption; WAL mode allows reads
//! while the simulation keeps saving.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::PersistenceConfig;
use crate::error::{EngineError, Result};
use crate::types::{AgentId, Tick, TilePos};

// ---------------------------------------------------------------------------
// WorldSnapshot
// ---------------------------------------------------------------------------

/// The complete mutable world state at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Identity of the run this snapshot belongs to.
    pub run_id: Uuid,
    /// The last completed tick.
    pub tick: Tick,
    /// Every agent: identity, memory store, working state.
    pub agents: Vec<Agent>,
    /// Occupied tiles, sorted `(y, x)`.
    pub occupancy: Vec<(TilePos, AgentId)>,
}

impl WorldSnapshot {
    /// Encode as compact bytes for tick-boundary autosaves.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] on encoding failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Decode from [`WorldSnapshot::to_bytes`] output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] on decoding failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| EngineError::Snapshot(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 (ISO 3309 / ITU-T V.42) of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database holding [`WorldSnapshot`]s.
pub struct SnapshotStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS snapshots (
    tick     INTEGER PRIMARY KEY,
    run_id   TEXT NOT NULL,
    data     BLOB NOT NULL,
    saved_at TEXT NOT NULL,
    checksum TEXT
);";

impl SnapshotStore {
    /// Open (or create) the snapshot database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "snapshot store opened");
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory store (tests).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Save (upsert) a snapshot, keyed by its tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if JSON encoding fails, or
    /// [`EngineError::Database`] on SQLite failures.
    pub fn save(&self, snapshot: &WorldSnapshot) -> Result<()> {
        let start = Instant::now();
        let json =
            serde_json::to_vec(snapshot).map_err(|e| EngineError::Snapshot(e.to_string()))?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO snapshots (tick, run_id, data, saved_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tick) DO UPDATE SET
                run_id = excluded.run_id,
                data = excluded.data,
                saved_at = excluded.saved_at,
                checksum = excluded.checksum",
            params![snapshot.tick.0 as i64, snapshot.run_id.to_string(), json, now, checksum],
        )?;

        debug!(
            tick = snapshot.tick.0,
            agents = snapshot.agents.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot for a specific tick, if any.
    ///
    /// A checksum mismatch is logged but the data is still returned;
    /// undecodable data is the run-fatal case.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if JSON decoding fails, or
    /// [`EngineError::Database`] on SQLite failures.
    pub fn load(&self, tick: Tick) -> Result<Option<WorldSnapshot>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM snapshots WHERE tick = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![tick.0 as i64], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };
        self.verify_checksum(&data, stored_checksum.as_deref(), tick);
        let snapshot: WorldSnapshot =
            serde_json::from_slice(&data).map_err(|e| EngineError::Snapshot(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Load the most recent snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Snapshot`] if JSON decoding fails, or
    /// [`EngineError::Database`] on SQLite failures.
    pub fn load_latest(&self) -> Result<Option<WorldSnapshot>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT tick, data, checksum FROM snapshots ORDER BY tick DESC LIMIT 1",
        )?;
        let row: Option<(i64, Vec<u8>, Option<String>)> = stmt
            .query_row([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .optional()?;
        let Some((tick, data, stored_checksum)) = row else {
            return Ok(None);
        };
        self.verify_checksum(&data, stored_checksum.as_deref(), Tick(tick as u64));
        let snapshot: WorldSnapshot =
            serde_json::from_slice(&data).map_err(|e| EngineError::Snapshot(e.to_string()))?;
        Ok(Some(snapshot))
    }

    fn verify_checksum(&self, data: &[u8], stored: Option<&str>, tick: Tick) {
        if !self.config.checksum_enabled {
            return;
        }
        if let Some(expected) = stored {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(
                    tick = tick.0,
                    expected,
                    actual,
                    "snapshot checksum mismatch — possible corruption"
                );
            }
        }
    }

    /// Ticks with stored snapshots, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] on SQLite failures.
    pub fn ticks(&self) -> Result<Vec<Tick>> {
        let mut stmt = self.conn.prepare_cached("SELECT tick FROM snapshots ORDER BY tick ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ticks = Vec::new();
        for row in rows {
            ticks.push(Tick(row? as u64));
        }
        Ok(ticks)
    }

    /// Number of stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] on SQLite failures.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// Copy the database to `dest_path` via SQLite's online-backup API;
    /// safe while the store is in use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "snapshot database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup next to the database file, keeping at
    /// most `config.backup_count`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] or [`EngineError::Io`] on
    /// failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }
        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            let dst = self.backup_path(i + 1);
            if src.exists() {
                std::fs::rename(&src, &dst)?;
            }
        }
        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        self.backup(self.backup_path(1))
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension().map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    /// Run SQLite's integrity check; `Ok(false)` means corruption.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Database`] if the check query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self.conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;
        Ok(result == "ok")
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Adds an `.optional()` combinator to `rusqlite::Result`, converting
/// `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NodeDraft;

    fn sample_snapshot() -> WorldSnapshot {
        let mut agent = Agent::new(AgentId(0), "Ana", "Ana paints.", TilePos::new(2, 3), 4);
        agent
            .store
            .append(
                NodeDraft::event("Ana", "is painting", "a canvas", "Ana paints a canvas", 6.0)
                    .with_embedding(crate::types::Embedding(vec![0.1, 0.2, 0.3, 0.4])),
                Tick(7),
            )
            .expect("append");
        agent.scratch.unreflected_importance = agent.store.unreflected_importance();

        WorldSnapshot {
            run_id: Uuid::new_v4(),
            tick: Tick(7),
            agents: vec![agent],
            occupancy: vec![(TilePos::new(2, 3), AgentId(0))],
        }
    }

    #[test]
    fn bincode_round_trip_is_structurally_identical() {
        let snapshot = sample_snapshot();
        let bytes = snapshot.to_bytes().expect("encode");
        let restored = WorldSnapshot::from_bytes(&bytes).expect("decode");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn sqlite_round_trip_preserves_stores() {
        let store = SnapshotStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let snapshot = sample_snapshot();
        store.save(&snapshot).expect("save");

        let loaded = store.load(Tick(7)).expect("load").expect("present");
        assert_eq!(loaded, snapshot);
        // Node ids and keyword indexes survive.
        let node = loaded.agents[0]
            .store
            .node(crate::types::NodeId(0))
            .expect("node");
        assert_eq!(node.description, "Ana paints a canvas");
        assert!(loaded.agents[0].store.get_by_keyword("canvas").contains(&node.id));
    }

    #[test]
    fn load_missing_tick_is_none() {
        let store = SnapshotStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        assert!(store.load(Tick(1)).expect("load").is_none());
        assert!(store.load_latest().expect("load").is_none());
    }

    #[test]
    fn load_latest_picks_highest_tick() {
        let store = SnapshotStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let mut snapshot = sample_snapshot();
        store.save(&snapshot).expect("save t7");
        snapshot.tick = Tick(12);
        store.save(&snapshot).expect("save t12");

        let latest = store.load_latest().expect("load").expect("present");
        assert_eq!(latest.tick, Tick(12));
        assert_eq!(store.ticks().expect("ticks"), vec![Tick(7), Tick(12)]);
        assert_eq!(store.count().expect("count"), 2);
    }

    #[test]
    fn corrupted_checksum_still_loads_with_warning() {
        let store = SnapshotStore::open_in_memory(&PersistenceConfig::default()).expect("open");
        let snapshot = sample_snapshot();
        store.save(&snapshot).expect("save");
        store
            .conn
            .execute("UPDATE snapshots SET checksum = 'deadbeef' WHERE tick = 7", [])
            .expect("corrupt");
        let loaded = store.load(Tick(7)).expect("load").expect("present");
        assert_eq!(loaded.tick, Tick(7));
    }

    #[test]
    fn file_backup_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("world.db");
        let config = PersistenceConfig::default();

        let store = SnapshotStore::open(&db_path, &config).expect("open");
        store.save(&sample_snapshot()).expect("save");

        let backup_path = dir.path().join("world_backup.db");
        store.backup(&backup_path).expect("backup");

        let restored_store = SnapshotStore::open(&backup_path, &config).expect("open backup");
        assert_eq!(restored_store.count().expect("count"), 1);
        assert!(restored_store.integrity_check().expect("check"));
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}
