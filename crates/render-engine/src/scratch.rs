//! Per-render scratch directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use stitcher_common::config::ScratchConfig;
use stitcher_common::error::{StitchError, StitchResult};

/// Private working directory for one render. Removed on drop unless kept.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
    kept: bool,
}

impl ScratchDir {
    /// Create a fresh `stitcher-*` directory. `keep` overrides the config.
    pub fn create(config: &ScratchConfig, keep: bool) -> StitchResult<Self> {
        let kept = keep || config.keep;
        let mut builder = tempfile::Builder::new();
        builder.prefix("stitcher-").disable_cleanup(kept);
        let dir = match &config.base_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| StitchError::storage(format!("failed to create scratch directory: {e}")))?;

        if kept {
            tracing::info!(path = %dir.path().display(), "Keeping scratch directory");
        }
        Ok(Self { dir, kept })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn is_kept(&self) -> bool {
        self.kept
    }
}
