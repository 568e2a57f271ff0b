//! Persistent vessel registry interface.
//!
//! The registry is the only durable state shared between bulk ingestion
//! and identity resolution. Backends:
//! - `SqliteRegistry`: local file, default
//! - `PgRegistry` (see `crate::db`): PostgreSQL via sqlx

pub mod sqlite;

pub use sqlite::SqliteRegistry;

use crate::config::RegistryBackend;
use crate::error::Result;
use crate::vessel::VesselRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Conflict-resolving key-value store keyed on normalized vessel name.
///
/// Writes are last-writer-wins per record; a batch carries no
/// cross-record transaction guarantee.
#[async_trait]
pub trait VesselRegistry: Send + Sync {
    /// Cheap reachability check used before an ingestion run starts.
    async fn ping(&self) -> Result<()>;

    /// Insert-or-replace every record, keyed on `name`. Returns the number
    /// of records written.
    async fn upsert_batch(&self, records: &[VesselRecord]) -> Result<usize>;

    /// Point lookup by exact normalized name.
    async fn get(&self, name: &str) -> Result<Option<VesselRecord>>;

    /// Backend label for logs.
    fn backend_name(&self) -> &str;
}

/// Open the registry selected by configuration.
pub async fn open_registry(backend: &RegistryBackend) -> Result<Arc<dyn VesselRegistry>> {
    match backend {
        RegistryBackend::Sqlite { path } => Ok(Arc::new(SqliteRegistry::open(path)?)),
        RegistryBackend::Postgres { url } => {
            let pool = crate::db::init_pool(url).await?;
            let registry = crate::db::PgRegistry::new(pool);
            registry.init_schema().await?;
            Ok(Arc::new(registry))
        }
    }
}
