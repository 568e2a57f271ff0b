//! Batch Upserter - writes a source's snapshot in bounded batches

use crate::error::{RegistryError, Result};
use crate::registry::VesselRegistry;
use crate::vessel::VesselRecord;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{error, info};

/// What a failed batch does to the rest of the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchFailurePolicy {
    /// Log the failed batch and keep going; registry entries are advisory.
    #[default]
    ContinueOnError,
    /// Stop at the first failed batch and fail the source.
    AbortOnError,
}

impl FromStr for BatchFailurePolicy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue-on-error" => Ok(Self::ContinueOnError),
            "abort" | "abort-on-error" => Ok(Self::AbortOnError),
            other => Err(RegistryError::Config(format!(
                "unknown batch failure policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpsertReport {
    pub batches_attempted: usize,
    pub batches_failed: usize,
    pub records_written: usize,
    /// Starting offset of every failed batch, for manual re-drive.
    pub failed_offsets: Vec<usize>,
}

pub struct BatchUpserter {
    batch_size: usize,
    policy: BatchFailurePolicy,
}

impl BatchUpserter {
    pub fn new(batch_size: usize, policy: BatchFailurePolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            policy,
        }
    }

    pub fn policy(&self) -> BatchFailurePolicy {
        self.policy
    }

    /// Issue one conflict-resolving write per batch.
    pub async fn upsert(
        &self,
        registry: &dyn VesselRegistry,
        source_id: &str,
        records: &[VesselRecord],
    ) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();
        if records.is_empty() {
            return Ok(report);
        }

        info!(
            "Upserting {} vessels from {} to {} registry...",
            records.len(),
            source_id,
            registry.backend_name()
        );

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let offset = index * self.batch_size;
            report.batches_attempted += 1;

            match registry.upsert_batch(batch).await {
                Ok(written) => {
                    report.records_written += written;
                    if offset % 5000 == 0 {
                        info!("  Upserted {} records...", offset + batch.len());
                    }
                }
                Err(e) => {
                    error!(
                        "[{}] Batch starting at {} failed: {}",
                        source_id, offset, e
                    );
                    report.batches_failed += 1;
                    report.failed_offsets.push(offset);

                    if self.policy == BatchFailurePolicy::AbortOnError {
                        return Err(RegistryError::UpsertBatchFailure {
                            offset,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }
}
