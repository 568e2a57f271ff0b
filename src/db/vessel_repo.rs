//! Vessel registry repository for PostgreSQL

use crate::error::{RegistryError, Result};
use crate::registry::VesselRegistry;
use crate::vessel::VesselRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vessel_master (
                vessel_name TEXT PRIMARY KEY,
                mmsi TEXT,
                imo TEXT,
                ship_type TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::Store(format!("Failed to create vessel_master: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl VesselRegistry for PgRegistry {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// One statement per batch: the arrays are unnested server side so the
    /// whole batch costs a single round trip.
    async fn upsert_batch(&self, records: &[VesselRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        let mmsis: Vec<Option<String>> = records.iter().map(|r| r.mmsi.clone()).collect();
        let imos: Vec<Option<String>> = records.iter().map(|r| r.imo.clone()).collect();
        let ship_types: Vec<String> = records.iter().map(|r| r.ship_type.clone()).collect();
        let updated: Vec<DateTime<Utc>> = records.iter().map(|r| r.updated_at).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO vessel_master (vessel_name, mmsi, imo, ship_type, updated_at)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::timestamptz[])
            ON CONFLICT (vessel_name) DO UPDATE SET
                mmsi = EXCLUDED.mmsi,
                imo = EXCLUDED.imo,
                ship_type = EXCLUDED.ship_type,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&names)
        .bind(&mmsis)
        .bind(&imos)
        .bind(&ship_types)
        .bind(&updated)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::Store(format!("Failed to upsert vessels: {}", e)))?;

        Ok(result.rows_affected() as usize)
    }

    async fn get(&self, name: &str) -> Result<Option<VesselRecord>> {
        let row = sqlx::query(
            r#"
            SELECT vessel_name, mmsi, imo, ship_type, updated_at
            FROM vessel_master
            WHERE vessel_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RegistryError::Store(format!("Failed to load vessel {}: {}", name, e)))?;

        row.map(|row| -> Result<VesselRecord> {
            Ok(VesselRecord {
                name: row.try_get("vessel_name")?,
                mmsi: row.try_get("mmsi")?,
                imo: row.try_get("imo")?,
                ship_type: row.try_get("ship_type")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}
