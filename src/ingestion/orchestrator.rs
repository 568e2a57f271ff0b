//! Ingestion Orchestrator - sequences sources through the pipeline
//!
//! Sources are processed strictly in list order, one at a time. Reading,
//! parsing, filtering and deduplication run on a blocking thread; the
//! batched upserts run on the async registry.

use crate::config::IngestionOptions;
use crate::error::{RegistryError, Result};
use crate::ingestion::{
    open_archive, BatchUpserter, CargoFilter, CsvConnector, IngestionConnector, IngestionResult,
    IngestionStatus, RunTracker, SourceLocator, VesselSnapshot,
};
use crate::registry::VesselRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Batches between progress log lines.
const PROGRESS_EVERY_BATCHES: u64 = 10;

/// What happened to one source in a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SourceOutcome {
    /// Already in the processed set.
    Skipped,
    /// Every batch was attempted and the source was marked processed.
    Completed(IngestionResult),
    /// Fatal for this source; it stays unprocessed.
    Failed(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Completed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Skipped))
    }

    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Rows and counters from the extraction half of the pipeline.
struct Extraction {
    snapshot: VesselSnapshot,
    rows_read: u64,
    rows_dropped: u64,
    batches_skipped: u64,
}

/// Ingestion Orchestrator - Coordinates the entire ingestion process
pub struct IngestionOrchestrator {
    registry: Arc<dyn VesselRegistry>,
    options: IngestionOptions,
    upserter: BatchUpserter,
}

impl IngestionOrchestrator {
    pub fn new(registry: Arc<dyn VesselRegistry>, options: IngestionOptions) -> Self {
        let upserter = BatchUpserter::new(options.batch_size, options.failure_policy);
        Self {
            registry,
            options,
            upserter,
        }
    }

    /// Process every source not yet in the tracker's set.
    ///
    /// Only an unreachable registry (checked before the first source) or an
    /// unreadable tracker file aborts the run; everything else is recorded
    /// per source.
    pub async fn run(&self, sources: &[SourceLocator]) -> Result<RunSummary> {
        self.registry.ping().await.map_err(|e| {
            error!("Vessel registry unreachable, aborting run: {}", e);
            e
        })?;

        let mut tracker = RunTracker::load(&self.options.tracking_file)?;
        let pending = sources
            .iter()
            .filter(|s| !tracker.is_processed(&s.source_id()))
            .count();
        info!(
            "Found {} sources total. {} new sources to process.",
            sources.len(),
            pending
        );

        let mut summary = RunSummary::default();

        for source in sources {
            let source_id = source.source_id();

            if tracker.is_processed(&source_id) {
                info!("Skipping already processed source: {}", source_id);
                summary.outcomes.push((source_id, SourceOutcome::Skipped));
                continue;
            }

            match self.ingest_source(source).await {
                Ok(result) => {
                    if let Err(e) = tracker.mark_processed(&source_id) {
                        error!(
                            "Processed {} but failed to record it in {}: {}",
                            source_id,
                            tracker.path().display(),
                            e
                        );
                    } else {
                        info!("Successfully processed and recorded: {}", source_id);
                    }
                    summary
                        .outcomes
                        .push((source_id, SourceOutcome::Completed(result)));
                }
                Err(e) => {
                    error!("Failed to process {}: {}", source_id, e);
                    summary
                        .outcomes
                        .push((source_id, SourceOutcome::Failed(e.to_string())));
                }
            }
        }

        info!(
            "Ingestion finished: {} completed, {} failed, {} skipped",
            summary.completed(),
            summary.failed(),
            summary.skipped()
        );
        Ok(summary)
    }

    /// Run one source end to end without consulting the tracker.
    pub async fn ingest_source(&self, source: &SourceLocator) -> Result<IngestionResult> {
        let run_id = Uuid::new_v4().to_string();
        let source_id = source.source_id();
        info!("Processing: {} (run {})", source, run_id);

        let locator = source.clone();
        let chunk_rows = self.options.chunk_rows;
        let connect_timeout = self.options.connect_timeout;
        let extraction =
            tokio::task::spawn_blocking(move || extract(&locator, chunk_rows, connect_timeout))
                .await
                .map_err(|e| RegistryError::CorruptStream {
                    source_id: source_id.clone(),
                    reason: format!("extraction task failed: {}", e),
                })??;

        let rows_kept = extraction.snapshot.rows_folded();
        let unique_vessels = extraction.snapshot.len();
        if extraction.snapshot.is_empty() {
            info!("  No cargo vessels found in {}", source_id);
        }

        let records = extraction.snapshot.into_records();
        let upsert = self
            .upserter
            .upsert(self.registry.as_ref(), &source_id, &records)
            .await?;

        let status = if upsert.batches_failed == 0 {
            IngestionStatus::Success
        } else if upsert.batches_failed == upsert.batches_attempted {
            IngestionStatus::Failed
        } else {
            IngestionStatus::Partial
        };
        if status != IngestionStatus::Success {
            warn!(
                "{}: {} of {} batches failed (offsets {:?})",
                source_id, upsert.batches_failed, upsert.batches_attempted, upsert.failed_offsets
            );
        }

        Ok(IngestionResult {
            source_id,
            run_id,
            rows_read: extraction.rows_read,
            rows_dropped: extraction.rows_dropped,
            rows_kept,
            batches_skipped: extraction.batches_skipped,
            unique_vessels,
            upsert,
            status,
        })
    }
}

/// Read, parse, filter and deduplicate one source. Blocking.
fn extract(
    source: &SourceLocator,
    chunk_rows: usize,
    connect_timeout: Duration,
) -> Result<Extraction> {
    let stream = open_archive(source, connect_timeout)?;
    let source_uri = match source {
        SourceLocator::Url(url) => Some(url.clone()),
        SourceLocator::Path(_) => None,
    };
    let mut connector = CsvConnector::from_archive(stream, source_uri, chunk_rows)?;

    let filter = CargoFilter;
    let mut snapshot = VesselSnapshot::new();

    loop {
        let result = connector.fetch()?;
        snapshot.fold(filter.apply(result.rows));

        let checkpoint = result.checkpoint;
        if result.has_more && checkpoint.batches % PROGRESS_EVERY_BATCHES == 0 {
            info!(
                "  Processed {} rows... Current unique vessels: {}",
                checkpoint.rows_read,
                snapshot.len()
            );
        }

        if !result.has_more {
            return Ok(Extraction {
                snapshot,
                rows_read: checkpoint.rows_read,
                rows_dropped: checkpoint.rows_dropped,
                batches_skipped: checkpoint.batches_skipped,
            });
        }
    }
}
