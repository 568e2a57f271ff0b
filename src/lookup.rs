//! External vessel lookup service client.
//!
//! The service takes a free-text name and returns zero or more candidates.
//! It is rate limited and billed per call, which is why the resolver only
//! reaches it after the static table and the registry miss.

use crate::config::LookupConfig;
use crate::error::{RegistryError, Result};
use crate::vessel::{coerce_mmsi, strip_imo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One candidate as reported by the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupCandidate {
    pub mmsi: Option<String>,
    pub imo: Option<String>,
    pub name: Option<String>,
    /// Free-text type description, e.g. "Container Ship".
    pub type_summary: Option<String>,
}

impl LookupCandidate {
    fn from_json(obj: &Value) -> Option<Self> {
        if !obj.is_object() {
            return None;
        }
        Some(Self {
            mmsi: text_field(obj, &["MMSI", "mmsi"]).and_then(|v| coerce_mmsi(&v)),
            imo: text_field(obj, &["IMO", "imo"]).and_then(|v| strip_imo(&v)),
            name: text_field(obj, &["NAME", "name", "SHIPNAME", "shipname"]),
            type_summary: text_field(obj, &["TYPE", "type", "type_summary", "TYPE_SUMMARY"]),
        })
    }
}

/// First present key of `keys`, as text. Numbers are rendered without quotes.
fn text_field(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a bare array, an object wrapping `results` or `data`, or a
/// single candidate object.
pub fn parse_candidates(body: &Value) -> Vec<LookupCandidate> {
    let items: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("results").or_else(|| map.get("data")) {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![body],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(LookupCandidate::from_json)
        .filter(|c| c.mmsi.is_some() || c.imo.is_some() || c.name.is_some())
        .collect()
}

#[async_trait]
pub trait VesselLookup: Send + Sync {
    /// Search by free-text name. Candidates come back in service order.
    async fn search(&self, name: &str) -> Result<Vec<LookupCandidate>>;
}

/// RapidAPI-hosted vessel finder.
pub struct RapidApiLookup {
    client: reqwest::Client,
    config: LookupConfig,
}

impl RapidApiLookup {
    pub fn new(config: LookupConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                RegistryError::LookupServiceFailure(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl VesselLookup for RapidApiLookup {
    async fn search(&self, name: &str) -> Result<Vec<LookupCandidate>> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            RegistryError::LookupServiceFailure("no lookup API key configured".to_string())
        })?;

        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        debug!("Vessel lookup for '{}' via {}", name, url);

        let response = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", &self.config.api_host)
            .send()
            .await
            .map_err(|e| RegistryError::LookupServiceFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::LookupServiceFailure(format!(
                "service answered {} for '{}'",
                status, name
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            RegistryError::LookupServiceFailure(format!("Failed to parse response: {}", e))
        })?;

        Ok(parse_candidates(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_with_mixed_case_keys() {
        let body = json!([
            {"MMSI": 440176000, "IMO": "9863302", "NAME": "HMM HOPE", "TYPE": "Container Ship"},
            {"mmsi": "538006575.0", "imo": "IMO 9302152", "name": "KOTA LUMBA", "type_summary": "Bulk Carrier"}
        ]);
        let candidates = parse_candidates(&body);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].mmsi.as_deref(), Some("440176000"));
        assert_eq!(candidates[0].type_summary.as_deref(), Some("Container Ship"));
        assert_eq!(candidates[1].mmsi.as_deref(), Some("538006575"));
        assert_eq!(candidates[1].imo.as_deref(), Some("9302152"));
    }

    #[test]
    fn test_parse_wrapped_and_single_object() {
        let wrapped = json!({"results": [{"MMSI": "1", "NAME": "A"}]});
        assert_eq!(parse_candidates(&wrapped).len(), 1);

        let data = json!({"data": [{"MMSI": "1"}, {"MMSI": "2"}]});
        assert_eq!(parse_candidates(&data).len(), 2);

        let single = json!({"MMSI": "3", "NAME": "C"});
        assert_eq!(parse_candidates(&single)[0].mmsi.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_empty_shapes() {
        assert!(parse_candidates(&json!([])).is_empty());
        assert!(parse_candidates(&json!({"results": []})).is_empty());
        assert!(parse_candidates(&json!({"error": "not found"})).is_empty());
        assert!(parse_candidates(&json!("nope")).is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_lookup_failure() {
        let lookup = RapidApiLookup::new(LookupConfig::default()).unwrap();
        let err = lookup.search("EVER GIVEN").await.unwrap_err();
        assert!(matches!(err, RegistryError::LookupServiceFailure(_)));
    }
}
