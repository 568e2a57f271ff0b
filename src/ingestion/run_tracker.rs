//! Run Tracker - the durable set of fully processed sources
//!
//! Read once at startup and rewritten in full after every attempted
//! source. No file locking: overlapping runs can race on the file.

use crate::error::Result;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct RunTracker {
    path: PathBuf,
    processed: BTreeSet<String>,
}

impl RunTracker {
    /// Load the persisted set. A missing file is an empty set; so is an
    /// unreadable one, which is logged and overwritten on the next mark.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let processed = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!(
                        "Ignoring unreadable tracking file {}: {}",
                        path.display(),
                        e
                    );
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Loaded {} processed sources from {}",
            processed.len(),
            path.display()
        );
        Ok(Self { path, processed })
    }

    pub fn is_processed(&self, source_id: &str) -> bool {
        self.processed.contains(source_id)
    }

    /// Add a source and persist the whole set.
    pub fn mark_processed(&mut self, source_id: &str) -> Result<()> {
        self.processed.insert(source_id.to_string());
        self.save()
    }

    pub fn processed(&self) -> impl Iterator<Item = &str> {
        self.processed.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let list: Vec<&String> = self.processed.iter().collect();
        let json = serde_json::to_string_pretty(&list)?;

        // Write beside the target, then rename into place.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
