//! Error types shared across Stitcher crates.

use std::path::PathBuf;

/// Top-level error type for Stitcher operations.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    /// Malformed spec structure.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// No source yielded a usable start timestamp for an input.
    #[error("Missing start time for input '{stream}': no explicit start, comment tag, or filename timestamp")]
    MissingStartTime { stream: String },

    #[error("Alignment error: {message}")]
    Alignment { message: String },

    #[error("Milestone invariant violated: {message}")]
    MilestoneInvariant { message: String },

    /// One chunk's media-engine invocation failed.
    #[error("Chunk {index} failed to render: {message}")]
    ChunkRender { index: usize, message: String },

    /// Finalization was attempted with failed or missing chunks.
    #[error("Incomplete render: chunks {failed:?} did not render")]
    IncompleteRender { failed: Vec<usize> },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    /// A non-chunk media-engine job (concat, mux) failed.
    #[error("{tool} failed: {message}")]
    Engine { tool: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StitchError.
pub type StitchResult<T> = Result<T, StitchError>;

impl StitchError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    pub fn missing_start_time(stream: impl Into<String>) -> Self {
        Self::MissingStartTime {
            stream: stream.into(),
        }
    }

    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment {
            message: msg.into(),
        }
    }

    pub fn milestone(msg: impl Into<String>) -> Self {
        Self::MilestoneInvariant {
            message: msg.into(),
        }
    }

    pub fn chunk_render(index: usize, msg: impl Into<String>) -> Self {
        Self::ChunkRender {
            index,
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn engine(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Engine {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error is raised while loading a spec, before any rendering.
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::MissingStartTime { .. } | Self::MilestoneInvariant { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_render_names_failed_indices() {
        let err = StitchError::IncompleteRender { failed: vec![1, 3] };
        assert_eq!(err.to_string(), "Incomplete render: chunks [1, 3] did not render");
    }

    #[test]
    fn test_load_time_classification() {
        assert!(StitchError::schema("x").is_load_time());
        assert!(StitchError::missing_start_time("cam").is_load_time());
        assert!(StitchError::milestone("x").is_load_time());
        assert!(!StitchError::chunk_render(0, "boom").is_load_time());
        assert!(!StitchError::storage("x").is_load_time());
    }
}
