//! ffprobe-backed media prober.

use std::path::{Path, PathBuf};
use std::process::Command;

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::probe::{MediaProber, ProbedInput};

#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> StitchResult<ProbedInput> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-show_format",
                "-show_streams",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| StitchError::probe(path, format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(StitchError::probe(
                path,
                format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| StitchError::probe(path, format!("unreadable ffprobe output: {e}")))?;
        let probed = ProbedInput::from_ffprobe_json(path, &json)?;

        tracing::debug!(
            path = %path.display(),
            duration_secs = probed.duration_secs,
            streams = probed.streams.len(),
            "Probed input"
        );
        Ok(probed)
    }
}
