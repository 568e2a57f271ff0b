//! Identity Resolver - vessel name to maritime identifiers
//!
//! Tiers, in order:
//! 1. Static table of known vessels (no I/O)
//! 2. Persistent registry
//! 3. External lookup service, with the answer written back to the registry
//!
//! Concurrent resolutions of the same unseen name are not coordinated unless
//! `coalesce_inflight` is enabled; duplicate network calls and duplicate
//! write-backs are then possible but harmless under last-writer-wins.

use crate::config::ResolverOptions;
use crate::lookup::{LookupCandidate, VesselLookup};
use crate::registry::VesselRegistry;
use crate::vessel::{
    registry_key, ResolutionResult, ResolutionSource, VesselRecord, DEFAULT_SHIP_TYPE,
};
use dashmap::DashMap;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

lazy_static! {
    static ref KNOWN_VESSELS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("HMM HOPE", "440176000");
        m
    };

    /// Type descriptions that mark a lookup candidate as a cargo carrier.
    static ref CARGO_TYPE_LABELS: Vec<&'static str> = vec!["container", "cargo"];
}

/// Fixed name to MMSI table consulted before any I/O.
#[derive(Clone, Debug)]
pub struct StaticVesselTable {
    entries: HashMap<String, String>,
}

impl Default for StaticVesselTable {
    fn default() -> Self {
        Self {
            entries: KNOWN_VESSELS
                .iter()
                .map(|(name, mmsi)| (name.to_string(), mmsi.to_string()))
                .collect(),
        }
    }
}

impl StaticVesselTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, name: &str, mmsi: &str) -> Self {
        if let Some(key) = registry_key(name) {
            self.entries.insert(key, mmsi.to_string());
        }
        self
    }

    pub fn get(&self, normalized_name: &str) -> Option<&str> {
        self.entries.get(normalized_name).map(String::as_str)
    }
}

fn is_cargo_label(type_summary: &str) -> bool {
    let lowered = type_summary.to_lowercase();
    CARGO_TYPE_LABELS.iter().any(|label| lowered.contains(label))
}

/// First cargo/container candidate, else the first candidate.
pub fn select_candidate(candidates: &[LookupCandidate]) -> Option<&LookupCandidate> {
    candidates
        .iter()
        .find(|c| c.type_summary.as_deref().map_or(false, is_cargo_label))
        .or_else(|| candidates.first())
}

type InflightMap = DashMap<String, Arc<OnceCell<ResolutionResult>>>;

pub struct IdentityResolver {
    registry: Arc<dyn VesselRegistry>,
    lookup: Arc<dyn VesselLookup>,
    static_table: StaticVesselTable,
    inflight: Option<InflightMap>,
}

impl IdentityResolver {
    pub fn new(registry: Arc<dyn VesselRegistry>, lookup: Arc<dyn VesselLookup>) -> Self {
        Self::with_options(registry, lookup, &ResolverOptions::default())
    }

    pub fn with_options(
        registry: Arc<dyn VesselRegistry>,
        lookup: Arc<dyn VesselLookup>,
        options: &ResolverOptions,
    ) -> Self {
        Self {
            registry,
            lookup,
            static_table: StaticVesselTable::default(),
            inflight: options.coalesce_inflight.then(DashMap::new),
        }
    }

    pub fn with_static_table(mut self, table: StaticVesselTable) -> Self {
        self.static_table = table;
        self
    }

    /// Resolve a free-text vessel name. Never fails: every recoverable
    /// error along the way ends in an unresolved result.
    pub async fn resolve(&self, raw_name: &str) -> ResolutionResult {
        let key = match registry_key(raw_name) {
            Some(key) => key,
            None => {
                debug!("Ignoring empty vessel name {:?}", raw_name);
                return ResolutionResult::unresolved(false);
            }
        };

        if let Some(mmsi) = self.static_table.get(&key) {
            debug!("Static hit for {}", key);
            return ResolutionResult {
                mmsi: Some(mmsi.to_string()),
                imo: None,
                ship_type: None,
                from_cache: true,
                source: ResolutionSource::StaticHit,
            };
        }

        match self.registry.get(&key).await {
            Ok(Some(record)) => {
                debug!("Registry hit for {}", key);
                return ResolutionResult::from_record(&record, ResolutionSource::CacheHit);
            }
            Ok(None) => {}
            Err(e) => warn!("Registry read for '{}' failed, treating as miss: {}", key, e),
        }

        match &self.inflight {
            Some(inflight) => self.coalesced_lookup(inflight, raw_name, key).await,
            None => self.lookup_and_store(raw_name, &key).await,
        }
    }

    async fn coalesced_lookup(
        &self,
        inflight: &InflightMap,
        raw_name: &str,
        key: String,
    ) -> ResolutionResult {
        let cell = inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let mut performed_lookup = false;
        let mut result = cell
            .get_or_init(|| {
                performed_lookup = true;
                self.lookup_and_store(raw_name, &key)
            })
            .await
            .clone();

        inflight.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));

        // Only the caller that ran the lookup reports a network call.
        if !performed_lookup {
            result.from_cache = true;
        }
        result
    }

    async fn lookup_and_store(&self, raw_name: &str, key: &str) -> ResolutionResult {
        info!("Looking up vessel '{}' via lookup service", raw_name);

        let candidates = match self.lookup.search(raw_name).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Lookup for '{}' failed: {}", raw_name, e);
                return ResolutionResult::unresolved(true);
            }
        };

        let chosen = match select_candidate(&candidates) {
            Some(candidate) if candidate.mmsi.is_some() => candidate,
            Some(_) => {
                info!("Best candidate for '{}' carries no MMSI", raw_name);
                return ResolutionResult::unresolved(true);
            }
            None => {
                info!("No candidates for '{}'", raw_name);
                return ResolutionResult::unresolved(true);
            }
        };

        let record = VesselRecord::new(
            key,
            chosen.mmsi.clone(),
            chosen.imo.clone(),
            chosen
                .type_summary
                .clone()
                .unwrap_or_else(|| DEFAULT_SHIP_TYPE.to_string()),
        );

        if let Err(e) = self.registry.upsert_batch(std::slice::from_ref(&record)).await {
            warn!("Write-back for '{}' failed: {}", key, e);
        }

        ResolutionResult::from_record(&record, ResolutionSource::NetworkLookup)
    }
}
