//! Refresh orchestration.
//!
//! One refresh cycle runs `Checking -> Fetching -> Reconciling -> Aggregating
//! -> Writing` to completion; every failure past the check falls back to the
//! previous artifact, which stays byte-for-byte untouched. A stale-but-valid
//! artifact always beats none.

mod lock;
mod retry;

pub use lock::RefreshLock;
pub use retry::RetryPolicy;

use std::fmt;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::artifact::{aggregate, artifact_timestamp, write_artifact, ArtifactError, RefreshArtifact};
use crate::config::RefreshSettings;
use crate::fetcher::{FetchError, FetchOutcome, GigFetcher};
use crate::geodata::MunicipalityIndex;
use crate::reconcile::reconcile;

/// Phases of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Checking,
    Fetching,
    Reconciling,
    Aggregating,
    Writing,
    Error,
}

impl fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshPhase::Idle => "Idle",
            RefreshPhase::Checking => "Checking",
            RefreshPhase::Fetching => "Fetching",
            RefreshPhase::Reconciling => "Reconciling",
            RefreshPhase::Aggregating => "Aggregating",
            RefreshPhase::Writing => "Writing",
            RefreshPhase::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

/// What took a refresh cycle down.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Gig fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Fetch still partial after {attempts} attempt(s): {failed_cantons} canton(s) missing")]
    PartialExhausted { attempts: u32, failed_cantons: usize },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Another refresh is already in progress")]
    AlreadyRunning,
}

/// Result of one refresh cycle.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new artifact was written.
    Refreshed(RefreshArtifact),
    /// Existing artifact is inside the staleness window; nothing was written.
    SkippedFresh { age_hours: i64 },
    /// The cycle failed; the previous artifact (if any) was kept unchanged.
    FellBack {
        error: RefreshError,
        prior_artifact: bool,
    },
}

impl RefreshOutcome {
    /// Process exit code: non-zero only for a cold-start total failure, where
    /// the presentation layer would be left with nothing to render.
    pub fn exit_code(&self) -> i32 {
        match self {
            RefreshOutcome::FellBack {
                prior_artifact: false,
                ..
            } => 1,
            _ => 0,
        }
    }
}

/// Drives fetch -> reconcile -> aggregate -> write, and is the only component
/// with failure-recovery responsibility.
pub struct Orchestrator {
    settings: RefreshSettings,
    fetcher: Arc<dyn GigFetcher>,
    index: Arc<MunicipalityIndex>,
}

impl Orchestrator {
    pub fn new(
        settings: RefreshSettings,
        fetcher: Arc<dyn GigFetcher>,
        index: Arc<MunicipalityIndex>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            index,
        }
    }

    /// Run one refresh cycle to completion.
    pub async fn run(&self) -> RefreshOutcome {
        let mut phase = RefreshPhase::Idle;
        let artifact_path = self.settings.artifact_path();

        transition(&mut phase, RefreshPhase::Checking);
        let prior = artifact_timestamp(&artifact_path);
        if !self.settings.force {
            if let Some(stamp) = prior {
                let age = Utc::now() - stamp;
                if age <= ChronoDuration::hours(self.settings.staleness_hours as i64) {
                    info!(
                        "Artifact is {}h old (threshold {}h), skipping refresh",
                        age.num_hours(),
                        self.settings.staleness_hours
                    );
                    transition(&mut phase, RefreshPhase::Idle);
                    return RefreshOutcome::SkippedFresh {
                        age_hours: age.num_hours(),
                    };
                }
            }
        }

        let _lock = match RefreshLock::acquire(self.settings.lock_path()) {
            Ok(lock) => lock,
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                return self.fall_back(&mut phase, RefreshError::AlreadyRunning, prior.is_some());
            }
            Err(error) => {
                return self.fall_back(
                    &mut phase,
                    RefreshError::Artifact(ArtifactError::Io(error)),
                    prior.is_some(),
                );
            }
        };

        transition(&mut phase, RefreshPhase::Fetching);
        let outcome = match self.fetch_with_retries().await {
            Ok(outcome) => outcome,
            Err(error) => return self.fall_back(&mut phase, error, prior.is_some()),
        };

        transition(&mut phase, RefreshPhase::Reconciling);
        let matches = reconcile(outcome.records, &self.index, self.settings.fuzzy_threshold);

        transition(&mut phase, RefreshPhase::Aggregating);
        // Monotonically non-decreasing even under clock skew.
        let generated_at = match prior {
            Some(stamp) => stamp.max(Utc::now()),
            None => Utc::now(),
        };
        let artifact = aggregate(
            matches,
            &self.index,
            generated_at,
            self.settings.simplify_tolerance,
        );

        transition(&mut phase, RefreshPhase::Writing);
        match write_artifact(&artifact, &artifact_path) {
            Ok(()) => {
                transition(&mut phase, RefreshPhase::Idle);
                info!(
                    "Refresh complete: {}/{} gigs matched",
                    artifact.summary.total_matched, artifact.summary.total_fetched
                );
                RefreshOutcome::Refreshed(artifact)
            }
            Err(error) => {
                self.fall_back(&mut phase, RefreshError::Artifact(error), prior.is_some())
            }
        }
    }

    /// Fetch, retrying retryable failures and partial results with backoff
    /// until the attempt budget runs out.
    async fn fetch_with_retries(&self) -> Result<FetchOutcome, RefreshError> {
        let policy = RetryPolicy::new(&self.settings);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetcher.fetch().await {
                Ok(outcome) if !outcome.is_partial() => return Ok(outcome),
                Ok(partial) => {
                    warn!(
                        "Fetch attempt {} came back partial: {} canton(s) failed",
                        attempt,
                        partial.failed_cantons.len()
                    );
                    if attempt >= policy.max_attempts() {
                        return Err(RefreshError::PartialExhausted {
                            attempts: attempt,
                            failed_cantons: partial.failed_cantons.len(),
                        });
                    }
                }
                Err(error) if error.is_retryable() => {
                    warn!("Fetch attempt {} failed: {}", attempt, error);
                    if attempt >= policy.max_attempts() {
                        return Err(RefreshError::Fetch(error));
                    }
                }
                Err(fatal) => return Err(RefreshError::Fetch(fatal)),
            }
            let delay = policy.backoff(attempt);
            debug!("Backing off {:?} before fetch attempt {}", delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }
    }

    fn fall_back(
        &self,
        phase: &mut RefreshPhase,
        error: RefreshError,
        prior_artifact: bool,
    ) -> RefreshOutcome {
        transition(phase, RefreshPhase::Error);
        if prior_artifact {
            warn!("Refresh failed, keeping previous artifact: {}", error);
        } else {
            error!("Refresh failed with no previous artifact to fall back on: {}", error);
        }
        RefreshOutcome::FellBack {
            error,
            prior_artifact,
        }
    }
}

fn transition(phase: &mut RefreshPhase, next: RefreshPhase) {
    debug!("Refresh phase: {} -> {}", phase, next);
    *phase = next;
}
