//! Ingestion Connector Trait - batch-at-a-time interface over one source

use crate::error::Result;
use crate::vessel::RawRow;
use serde::{Deserialize, Serialize};

/// Progress through a source, carried forward with every batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Batches handed out so far (including skipped ones).
    pub batches: u64,

    /// Data rows read from the source so far.
    pub rows_read: u64,

    /// Rows dropped as malformed so far.
    pub rows_dropped: u64,

    /// Batches dropped because required columns were missing.
    pub batches_skipped: u64,
}

/// Result from connector fetch
#[derive(Clone, Debug)]
pub struct ConnectorResult {
    /// Validated rows of this batch
    pub rows: Vec<RawRow>,

    /// Progress after this batch
    pub checkpoint: Checkpoint,

    /// Has more data (false if this was the last batch)
    pub has_more: bool,
}

/// Ingestion Connector Trait
///
/// Implementations:
/// - CsvConnector: header-driven CSV over any decompressed byte stream
pub trait IngestionConnector: Send {
    /// Fetch the next bounded batch of rows
    fn fetch(&mut self) -> Result<ConnectorResult>;

    /// Get source ID (unique identifier)
    fn source_id(&self) -> &str;

    /// Get source type (e.g., "csv")
    fn source_type(&self) -> &str;

    /// Get source URI (if applicable)
    fn source_uri(&self) -> Option<&str> {
        None
    }
}
