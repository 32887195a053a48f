//! External gig fetcher.
//!
//! Talks to the MX3 API: OAuth client-credentials token, then a paginated
//! sweep over the Swiss cantons. A canton failing with a retryable error
//! yields a partial outcome instead of aborting the sweep; the orchestrator
//! decides what to do with partial results.

mod client;
mod models;

pub use client::Mx3Client;
pub use models::{
    ApiBand, ApiCategory, ApiPerformance, GigsEnvelope, GigsResponse, RawGigRecord, TokenResponse,
};

use async_trait::async_trait;
use thiserror::Error;

/// Why a fetch (or part of one) failed.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("API authentication failed: {0}")]
    Auth(String),

    #[error("API rate limit hit: {0}")]
    RateLimited(String),

    #[error("Network error talking to the gigs API: {0}")]
    Network(String),

    #[error("Malformed response from the gigs API: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Transient transport conditions only; auth and schema errors are not
    /// retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited(_) | FetchError::Network(_))
    }
}

/// Result of one full fetch sweep.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawGigRecord>,
    /// Cantons that failed with a retryable error, with the error that took
    /// them down. Non-retryable errors abort the sweep instead.
    pub failed_cantons: Vec<(String, FetchError)>,
}

impl FetchOutcome {
    /// A partial result carries some records but not all cantons answered.
    pub fn is_partial(&self) -> bool {
        !self.failed_cantons.is_empty()
    }
}

/// Seam between the orchestrator and the HTTP client, so tests can drive the
/// pipeline with a scripted fetcher.
#[async_trait]
pub trait GigFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError>;
}
