//! Temporary storage for uploaded images.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;

/// An upload written to staging storage.
///
/// Not `Clone`: whoever holds it is responsible for releasing it, and
/// [`Staging::release`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct StagedArtifact {
    path: PathBuf,
}

impl StagedArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create and delete staged uploads.
#[async_trait]
pub trait Staging: Send + Sync {
    /// Persist `data` under a fresh unique name.
    async fn stage(&self, data: Bytes) -> io::Result<StagedArtifact>;

    /// Delete a staged upload. Deleting something already gone succeeds.
    async fn release(&self, artifact: StagedArtifact) -> io::Result<()>;
}

/// Stages uploads as files in a directory.
pub struct TempDirStaging {
    dir: PathBuf,
}

impl TempDirStaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Staging for TempDirStaging {
    async fn stage(&self, data: Bytes) -> io::Result<StagedArtifact> {
        let dir = self.dir.clone();
        let path = tokio::task::spawn_blocking(move || -> io::Result<PathBuf> {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(".jpg")
                .tempfile_in(&dir)?;
            file.write_all(&data)?;
            file.flush()?;
            let (_, path) = file.keep()?;
            Ok(path)
        })
        .await
        .map_err(io::Error::other)??;

        tracing::debug!("Staged upload at {}", path.display());
        Ok(StagedArtifact::new(path))
    }

    async fn release(&self, artifact: StagedArtifact) -> io::Result<()> {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
