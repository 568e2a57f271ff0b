//! SQLite-backed vessel registry.
//!
//! One `vessel_master` table keyed on `vessel_name`; each batch is written
//! inside a single transaction with `ON CONFLICT ... DO UPDATE`.

use super::VesselRegistry;
use crate::error::{RegistryError, Result};
use crate::vessel::VesselRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct SqliteRegistry {
    path: Option<PathBuf>,
    db: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open or create the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(&path)
            .map_err(|e| RegistryError::Store(format!("Failed to open database: {}", e)))?;

        let registry = Self {
            path: Some(path),
            db: Arc::new(Mutex::new(db)),
        };
        registry.init_schema()?;

        info!("Opened vessel registry at {}", registry.location());
        Ok(registry)
    }

    /// Private in-memory database, mostly for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| RegistryError::Store(format!("Failed to open database: {}", e)))?;
        let registry = Self {
            path: None,
            db: Arc::new(Mutex::new(db)),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    fn location(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        lock_connection(&self.db)
    }

    /// Run `f` against the connection on the blocking pool so statements
    /// never stall an async worker.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock_connection(&db)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RegistryError::Store(format!("registry task failed: {}", e)))?
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.lock()?;

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS vessel_master (
                vessel_name TEXT PRIMARY KEY,
                mmsi TEXT,
                imo TEXT,
                ship_type TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| RegistryError::Store(format!("Failed to create table: {}", e)))?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_vessel_master_mmsi ON vessel_master(mmsi)",
            [],
        )
        .map_err(|e| RegistryError::Store(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    /// Number of stored vessels.
    pub fn count(&self) -> Result<u64> {
        let db = self.lock()?;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM vessel_master", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn lock_connection(db: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| RegistryError::Store("registry connection lock poisoned".to_string()))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl VesselRegistry for SqliteRegistry {
    async fn ping(&self) -> Result<()> {
        self.with_connection(|db| {
            db.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn upsert_batch(&self, records: &[VesselRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let records = records.to_vec();
        let written = self
            .with_connection(move |db| {
                let tx = db.transaction().map_err(|e| {
                    RegistryError::Store(format!("Failed to start transaction: {}", e))
                })?;

                {
                    let mut stmt = tx.prepare(
                        r#"
                        INSERT INTO vessel_master (vessel_name, mmsi, imo, ship_type, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT(vessel_name) DO UPDATE SET
                            mmsi = excluded.mmsi,
                            imo = excluded.imo,
                            ship_type = excluded.ship_type,
                            updated_at = excluded.updated_at
                        "#,
                    )?;

                    for record in &records {
                        stmt.execute(params![
                            record.name,
                            record.mmsi,
                            record.imo,
                            record.ship_type,
                            record.updated_at.to_rfc3339(),
                        ])?;
                    }
                }

                tx.commit().map_err(|e| {
                    RegistryError::Store(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(records.len())
            })
            .await?;

        debug!("Upserted {} vessels into {}", written, self.location());
        Ok(written)
    }

    async fn get(&self, name: &str) -> Result<Option<VesselRecord>> {
        let name = name.to_string();
        self.with_connection(move |db| {
            let record = db
                .query_row(
                    r#"
                    SELECT vessel_name, mmsi, imo, ship_type, updated_at
                    FROM vessel_master
                    WHERE vessel_name = ?1
                    "#,
                    params![name],
                    |row| {
                        let updated_at: String = row.get(4)?;
                        Ok(VesselRecord {
                            name: row.get(0)?,
                            mmsi: row.get(1)?,
                            imo: row.get(2)?,
                            ship_type: row.get(3)?,
                            updated_at: parse_timestamp(&updated_at),
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
