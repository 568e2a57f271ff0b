//! Vessel identity data model and the normalization rules shared by
//! bulk ingestion and on-demand resolution.
//!
//! Both paths write the same registry, so a name or identifier must
//! normalize identically no matter which path produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ship type stored when an archive row carries no type cell.
pub const DEFAULT_SHIP_TYPE: &str = "Cargo";

/// Textual not-a-number sentinel left behind by dataframe exports.
const NAN_SENTINEL: &str = "NAN";

/// Registry entity. `name` is the sole conflict key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselRecord {
    pub name: String,
    pub mmsi: Option<String>,
    pub imo: Option<String>,
    pub ship_type: String,
    pub updated_at: DateTime<Utc>,
}

impl VesselRecord {
    pub fn new(
        name: impl Into<String>,
        mmsi: Option<String>,
        imo: Option<String>,
        ship_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mmsi,
            imo,
            ship_type: ship_type.into(),
            updated_at: Utc::now(),
        }
    }
}

/// A validated archive row.
///
/// The parser only produces rows whose MMSI coerced and whose name
/// normalized to something usable; the remaining fields stay optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub mmsi: String,
    pub vessel_name: String,
    pub imo: Option<String>,
    pub vessel_type_code: Option<i64>,
}

impl RawRow {
    /// Ship type as stored in the registry: the integer code as text.
    pub fn ship_type(&self) -> String {
        self.vessel_type_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| DEFAULT_SHIP_TYPE.to_string())
    }

    pub fn into_record(self) -> VesselRecord {
        let ship_type = self.ship_type();
        VesselRecord::new(self.vessel_name, Some(self.mmsi), self.imo, ship_type)
    }
}

/// Which tier answered a resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionSource {
    StaticHit,
    CacheHit,
    NetworkLookup,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub mmsi: Option<String>,
    pub imo: Option<String>,
    pub ship_type: Option<String>,
    /// `false` whenever the lookup service was called for this request.
    pub from_cache: bool,
    pub source: ResolutionSource,
}

impl ResolutionResult {
    pub fn unresolved(network_called: bool) -> Self {
        Self {
            mmsi: None,
            imo: None,
            ship_type: None,
            from_cache: !network_called,
            source: ResolutionSource::Unresolved,
        }
    }

    pub fn from_record(record: &VesselRecord, source: ResolutionSource) -> Self {
        Self {
            mmsi: record.mmsi.clone(),
            imo: record.imo.clone(),
            ship_type: Some(record.ship_type.clone()),
            from_cache: source != ResolutionSource::NetworkLookup,
            source,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.mmsi.is_some()
    }
}

/// Uppercase and trim. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalize a name for use as a registry key, rejecting empty names and
/// the not-a-number sentinel.
pub fn registry_key(raw: &str) -> Option<String> {
    let name = normalize_name(raw);
    if name.is_empty() || name == NAN_SENTINEL {
        None
    } else {
        Some(name)
    }
}

/// Coerce an MMSI cell through float, then integer, then text, so that
/// `"123456789.0"` and `"123456789"` agree.
pub fn coerce_mmsi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some((value.trunc() as i64).to_string())
}

/// Strip every non-digit (including a literal `IMO` prefix). An empty
/// result is absent.
pub fn strip_imo(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Parse a vessel type cell. Archives sometimes float-encode the code
/// (`"71.0"`); fractional values are not type codes.
pub fn parse_type_code(raw: &str) -> Option<i64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    Some(value as i64)
}
