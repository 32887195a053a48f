//! Durable artifact storage.
//!
//! Writes go to a temporary file in the destination directory and are moved
//! into place with a single atomic rename, so a concurrent reader sees either
//! the fully-previous or the fully-new artifact, never a torn write.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use super::RefreshArtifact;

/// Storage-layer failures while writing or reading the artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to move artifact into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Atomically replace the artifact at `path`.
pub fn write_artifact(artifact: &RefreshArtifact, path: &Path) -> Result<(), ArtifactError> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(directory)?;
    serde_json::to_writer_pretty(&mut staged, artifact)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    info!("Wrote artifact to {:?} (generated at {})", path, artifact.generated_at);
    Ok(())
}

/// Load the artifact at `path`.
pub fn load_artifact(path: &Path) -> Result<RefreshArtifact, ArtifactError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read just the generation timestamp of an existing artifact.
///
/// Tolerant on purpose: a missing or unreadable artifact is indistinguishable
/// from "no artifact yet", which the orchestrator treats as "refresh needed".
pub fn artifact_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Stamp {
        generated_at: DateTime<Utc>,
    }

    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<Stamp>(&text)
        .ok()
        .map(|stamp| stamp.generated_at)
}
