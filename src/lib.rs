pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod lookup;
pub mod registry;
pub mod resolver;
pub mod vessel;

pub use config::{AppConfig, IngestionOptions, LookupConfig, RegistryBackend, ResolverOptions};
pub use error::{RegistryError, Result};
pub use ingestion::{IngestionOrchestrator, IngestionResult, IngestionStatus, RunSummary, SourceLocator, SourceOutcome};
pub use lookup::{LookupCandidate, RapidApiLookup, VesselLookup};
pub use registry::{open_registry, SqliteRegistry, VesselRegistry};
pub use resolver::{IdentityResolver, StaticVesselTable};
pub use vessel::{ResolutionResult, ResolutionSource, VesselRecord};
