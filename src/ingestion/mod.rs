//! Ingestion Module - AIS archives into the vessel registry
//!
//! One source at a time, fully drained before the next:
//! - Archive reading (local file or streamed HTTP body, zstd)
//! - Chunked CSV parsing with alias-based columns
//! - Cargo filtering and per-source deduplication
//! - Batched upserts with per-batch failure isolation
//! - Run tracking for resumability across restarts

pub mod archive;
pub mod connector;
pub mod csv_connector;
pub mod dedup;
pub mod filter;
pub mod orchestrator;
pub mod run_tracker;
pub mod sources;
pub mod upsert;

pub use archive::{open_archive, ArchiveStream, SourceLocator};
pub use connector::{Checkpoint, ConnectorResult, IngestionConnector};
pub use csv_connector::{ColumnMap, CsvConnector};
pub use dedup::VesselSnapshot;
pub use filter::{is_cargo_type, CargoFilter, CARGO_TYPE_CODES};
pub use orchestrator::{IngestionOrchestrator, RunSummary, SourceOutcome};
pub use run_tracker::RunTracker;
pub use upsert::{BatchFailurePolicy, BatchUpserter, UpsertReport};

use serde::{Deserialize, Serialize};

/// Ingestion result for one source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionResult {
    /// Source identifier as recorded by the run tracker
    pub source_id: String,

    /// Ingestion run ID
    pub run_id: String,

    /// Data rows read from the archive
    pub rows_read: u64,

    /// Rows dropped as malformed
    pub rows_dropped: u64,

    /// Rows that passed the cargo filter
    pub rows_kept: u64,

    /// Batches dropped for missing required columns
    pub batches_skipped: u64,

    /// Distinct vessel names after deduplication
    pub unique_vessels: usize,

    /// Upsert outcome
    pub upsert: UpsertReport,

    /// Status
    pub status: IngestionStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngestionStatus {
    Success,
    Partial,
    Failed,
}
