//! Process configuration, built once at startup and handed to each
//! component instead of living in module-level globals.

use crate::error::{RegistryError, Result};
use crate::ingestion::upsert::BatchFailurePolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SQLITE_PATH: &str = "data/vessel_master.db";
const DEFAULT_TRACKING_FILE: &str = "data/processed_sources.json";
const DEFAULT_LOOKUP_URL: &str = "https://vesselfinder1.p.rapidapi.com";
const DEFAULT_LOOKUP_HOST: &str = "vesselfinder1.p.rapidapi.com";

/// Where the persistent registry lives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegistryBackend {
    Sqlite { path: PathBuf },
    Postgres { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupConfig {
    pub base_url: String,
    /// `None` disables network lookups; every miss then resolves to unresolved.
    pub api_key: Option<String>,
    pub api_host: String,
    pub timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOOKUP_URL.to_string(),
            api_key: None,
            api_host: DEFAULT_LOOKUP_HOST.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Options for the bulk ingestion path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionOptions {
    /// Rows per parsed batch; bounds the parser's buffer.
    pub chunk_rows: usize,
    /// Records per registry upsert call.
    pub batch_size: usize,
    /// Connection timeout for streamed archives. The transfer itself has none.
    pub connect_timeout: Duration,
    pub tracking_file: PathBuf,
    pub failure_policy: BatchFailurePolicy,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_rows: 50_000,
            batch_size: 1000,
            connect_timeout: Duration::from_secs(30),
            tracking_file: PathBuf::from(DEFAULT_TRACKING_FILE),
            failure_policy: BatchFailurePolicy::ContinueOnError,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Let one caller per name perform the network step while concurrent
    /// callers wait for its answer.
    pub coalesce_inflight: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub registry: RegistryBackend,
    pub lookup: LookupConfig,
    pub ingestion: IngestionOptions,
    pub resolver: ResolverOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry: RegistryBackend::Sqlite {
                path: PathBuf::from(DEFAULT_SQLITE_PATH),
            },
            lookup: LookupConfig::default(),
            ingestion: IngestionOptions::default(),
            resolver: ResolverOptions::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// `DATABASE_URL` selects the PostgreSQL backend; otherwise
    /// `VESSEL_REGISTRY_DB` (or the default path) selects SQLite.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            config.registry = RegistryBackend::Postgres { url };
        } else if let Some(path) = non_empty("VESSEL_REGISTRY_DB") {
            config.registry = RegistryBackend::Sqlite {
                path: PathBuf::from(path),
            };
        }

        config.lookup.api_key = non_empty("RAPIDAPI_KEY");
        if let Some(url) = non_empty("VESSEL_LOOKUP_URL") {
            config.lookup.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(host) = non_empty("VESSEL_LOOKUP_HOST") {
            config.lookup.api_host = host;
        }

        if let Some(path) = non_empty("VESSEL_TRACKING_FILE") {
            config.ingestion.tracking_file = PathBuf::from(path);
        }
        if let Some(rows) = non_empty("VESSEL_CHUNK_ROWS") {
            config.ingestion.chunk_rows = parse_positive("VESSEL_CHUNK_ROWS", &rows)?;
        }
        if let Some(size) = non_empty("VESSEL_BATCH_SIZE") {
            config.ingestion.batch_size = parse_positive("VESSEL_BATCH_SIZE", &size)?;
        }
        if let Some(policy) = non_empty("VESSEL_BATCH_FAILURE_POLICY") {
            config.ingestion.failure_policy = policy.parse()?;
        }

        if let Some(flag) = non_empty("VESSEL_COALESCE_LOOKUPS") {
            config.resolver.coalesce_inflight = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RegistryError::Config(format!(
            "{} must be a positive integer, got '{}'",
            key, value
        ))),
    }
}
