//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{StitchError, StitchResult};

/// Global stitcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StitcherConfig {
    /// Rendering defaults and target codec policy.
    pub render: RenderDefaults,

    /// Where inputs are read from and artifacts are written to.
    pub storage: StorageConfig,

    /// Scratch directory handling.
    pub scratch: ScratchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output framerate used when a spec does not declare one.
    pub framerate: u32,

    /// Number of chunks rendered concurrently (`None` = CPU count).
    pub parallelism: Option<usize>,

    /// Container extension for chunks and the final artifact.
    pub container: String,

    /// Video encoder used for chunks.
    pub video_codec: String,

    /// Audio encoder used for the final mux.
    pub audio_codec: String,

    /// Sample rate of synthetic silence.
    pub audio_sample_rate: u32,

    /// ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary.
    pub ffprobe_path: PathBuf,
}

/// Storage locations for the local collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for relative input filenames (`None` = spec file directory).
    pub input_root: Option<PathBuf>,

    /// Directory receiving finished artifacts.
    pub output_dir: PathBuf,

    /// Optional directory finished artifacts are published to.
    pub publish_dir: Option<PathBuf>,
}

/// Scratch directory handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Parent directory for per-render scratch directories (`None` = system temp).
    pub base_dir: Option<PathBuf>,

    /// Keep scratch directories after rendering.
    pub keep: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "stitcher=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            framerate: 25,
            parallelism: None,
            container: "webm".to_string(),
            video_codec: "libvpx-vp9".to_string(),
            audio_codec: "libopus".to_string(),
            audio_sample_rate: 48000,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_root: None,
            output_dir: PathBuf::from("output"),
            publish_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RenderDefaults {
    /// Parallelism to use when the caller does not override it.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

impl StitcherConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> StitchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StitchError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            StitchError::config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the render pipeline cannot work with.
    pub fn validate(&self) -> StitchResult<()> {
        if self.render.framerate == 0 {
            return Err(StitchError::config("render.framerate must be positive"));
        }
        if self.render.parallelism == Some(0) {
            return Err(StitchError::config("render.parallelism must be at least 1"));
        }
        if self.render.container.trim().is_empty() {
            return Err(StitchError::config("render.container must not be empty"));
        }
        if self.render.audio_sample_rate == 0 {
            return Err(StitchError::config(
                "render.audio_sample_rate must be positive",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("stitcher").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_codec_policy() {
        let config = StitcherConfig::default();
        assert_eq!(config.render.framerate, 25);
        assert_eq!(config.render.container, "webm");
        assert!(config.render.effective_parallelism() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render": {"parallelism": 2}}"#).unwrap();

        let config = StitcherConfig::load_from(&path).unwrap();
        assert_eq!(config.render.parallelism, Some(2));
        assert_eq!(config.render.effective_parallelism(), 2);
        assert_eq!(config.render.video_codec, "libvpx-vp9");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render": {"parallelism": 0}}"#).unwrap();

        let err = StitcherConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, StitchError::Config { .. }));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            StitcherConfig::load_from(&path),
            Err(StitchError::Config { .. })
        ));
    }
}
