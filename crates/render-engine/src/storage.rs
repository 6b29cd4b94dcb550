//! Local filesystem collaborators for locating inputs and storing artifacts.

use std::path::{Path, PathBuf};

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::artifact::{ArtifactKey, OutputArtifact};
use stitcher_timeline::probe::InputLocator;

/// Resolves relative input filenames against a base directory.
///
/// Absolute paths and remote references (`s3://`, `http://`, `https://`)
/// are returned unchanged.
#[derive(Debug, Clone)]
pub struct LocalLocator {
    base: PathBuf,
}

impl LocalLocator {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

fn is_remote(filename: &str) -> bool {
    filename.starts_with("http") || filename.contains("://")
}

impl InputLocator for LocalLocator {
    fn locate(&self, filename: &str) -> StitchResult<PathBuf> {
        if filename.trim().is_empty() {
            return Err(StitchError::storage("empty input filename"));
        }
        if is_remote(filename) {
            return Ok(PathBuf::from(filename));
        }
        let path = Path::new(filename);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base.join(path))
        }
    }
}

/// Where finished artifacts live.
pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact for `key` has already been published.
    fn exists(&self, key: &ArtifactKey) -> StitchResult<bool>;

    /// Where the artifact for `key` lives, published or not.
    fn location(&self, key: &ArtifactKey) -> PathBuf;

    /// Publish a finished artifact, returning its location in the store.
    fn publish(&self, artifact: &OutputArtifact) -> StitchResult<String>;
}

/// Store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    extension: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name(&self.extension))
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn exists(&self, key: &ArtifactKey) -> StitchResult<bool> {
        Ok(self.path_for(key).is_file())
    }

    fn location(&self, key: &ArtifactKey) -> PathBuf {
        self.path_for(key)
    }

    fn publish(&self, artifact: &OutputArtifact) -> StitchResult<String> {
        let target = self.path_for(&artifact.key);
        if target == artifact.local_path {
            return Ok(target.display().to_string());
        }
        std::fs::create_dir_all(&self.root).map_err(|e| {
            StitchError::storage(format!(
                "failed to create store directory {}: {e}",
                self.root.display()
            ))
        })?;
        std::fs::copy(&artifact.local_path, &target).map_err(|e| {
            StitchError::storage(format!(
                "failed to publish {} to {}: {e}",
                artifact.local_path.display(),
                target.display()
            ))
        })?;
        tracing::info!(key = %artifact.key, target = %target.display(), "Published artifact");
        Ok(target.display().to_string())
    }
}
