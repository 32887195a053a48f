//! Swiss live-music map: data refresh and municipality-matching pipeline.
//!
//! Fetches gig listings from the MX3 API, reconciles their free-text
//! locations against the Swiss municipality reference set, and writes a
//! municipality-keyed artifact for the map front end. This library exposes
//! the internal modules for the integration tests and the `refresh` binary.

pub mod artifact;
pub mod config;
pub mod fetcher;
pub mod geodata;
pub mod reconcile;
pub mod refresh;

// Re-export commonly used types for convenience
pub use artifact::{aggregate, ArtifactError, RefreshArtifact};
pub use config::{AppConfig, CliConfig, Credentials, FileConfig};
pub use fetcher::{FetchError, FetchOutcome, GigFetcher, Mx3Client, RawGigRecord};
pub use geodata::{load_municipalities, Municipality, MunicipalityIndex, ReferenceLoadError};
pub use reconcile::{reconcile, MatchConfidence, MatchResult};
pub use refresh::{Orchestrator, RefreshError, RefreshOutcome};
