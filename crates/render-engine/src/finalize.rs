//! Finalization: concatenate rendered chunks and mux in the audio mix.

use std::io::Write;
use std::path::{Path, PathBuf};

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::artifact::{ArtifactKey, OutputArtifact};

use crate::engine::{MediaEngine, RenderJob};
use crate::mix::AudioMix;
use crate::renderer::RenderReport;

/// Name of the concat list written to scratch.
pub const CONCAT_LIST_FILE: &str = "chunks.txt";

/// What finalization did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The artifact was written by this call.
    Produced(OutputArtifact),
    /// An artifact for this key already existed; nothing was done.
    AlreadyPresent(OutputArtifact),
}

impl FinalizeOutcome {
    pub fn artifact(&self) -> &OutputArtifact {
        match self {
            FinalizeOutcome::Produced(a) | FinalizeOutcome::AlreadyPresent(a) => a,
        }
    }

    pub fn into_artifact(self) -> OutputArtifact {
        match self {
            FinalizeOutcome::Produced(a) | FinalizeOutcome::AlreadyPresent(a) => a,
        }
    }
}

/// Inputs to [`finalize`] besides the engine.
#[derive(Debug)]
pub struct FinalizeRequest<'a> {
    pub key: &'a ArtifactKey,
    pub report: &'a RenderReport,
    pub audio: AudioMix,
    pub duration_micros: i64,
    pub scratch: &'a Path,
    pub output_dir: &'a Path,
    pub extension: &'a str,
}

/// Deterministic location of the artifact for `key`.
pub fn artifact_path(output_dir: &Path, key: &ArtifactKey, extension: &str) -> PathBuf {
    output_dir.join(key.file_name(extension))
}

/// Produce the output artifact from a render report.
///
/// An existing artifact at the target path makes this a no-op. Otherwise
/// every chunk must have rendered to an existing file.
pub fn finalize(
    request: FinalizeRequest<'_>,
    engine: &dyn MediaEngine,
) -> StitchResult<FinalizeOutcome> {
    let destination = artifact_path(request.output_dir, request.key, request.extension);
    let artifact = OutputArtifact {
        key: request.key.clone(),
        local_path: destination.clone(),
    };
    if destination.is_file() {
        tracing::info!(path = %destination.display(), "Artifact already present, skipping finalize");
        return Ok(FinalizeOutcome::AlreadyPresent(artifact));
    }

    let parts = request.report.rendered_paths()?;
    let missing: Vec<usize> = request
        .report
        .outcomes
        .iter()
        .zip(&parts)
        .filter(|(_, path)| !path.is_file())
        .map(|(outcome, _)| outcome.index)
        .collect();
    if !missing.is_empty() {
        return Err(StitchError::IncompleteRender { failed: missing });
    }

    let list_file = request.scratch.join(CONCAT_LIST_FILE);
    write_concat_list(&list_file, &parts)?;

    let video = request
        .scratch
        .join(format!("video.{}", request.extension));
    let concat = RenderJob::Concat {
        list_file,
        parts,
        destination: video.clone(),
    };
    tracing::info!(job = %concat.label(), "Concatenating chunks");
    engine.execute(&concat)?;

    std::fs::create_dir_all(request.output_dir).map_err(|e| {
        StitchError::storage(format!(
            "failed to create output directory {}: {e}",
            request.output_dir.display()
        ))
    })?;

    // Mux next to the target, then rename, so a partial file never sits at
    // the artifact path.
    let partial = request.output_dir.join(format!(
        "{}.partial.{}",
        request.key.short(),
        request.extension
    ));
    let mux = RenderJob::Mux {
        video,
        audio_graph: request.audio.graph,
        audio: request.audio.track,
        duration_micros: request.duration_micros,
        destination: partial.clone(),
    };
    tracing::info!(job = %mux.label(), "Muxing audio");
    if let Err(err) = engine.execute(&mux) {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }
    std::fs::rename(&partial, &destination).map_err(|e| {
        StitchError::storage(format!(
            "failed to move {} to {}: {e}",
            partial.display(),
            destination.display()
        ))
    })?;

    tracing::info!(path = %destination.display(), key = %request.key, "Artifact produced");
    Ok(FinalizeOutcome::Produced(artifact))
}

/// Write an ffmpeg concat-demuxer list.
pub fn write_concat_list(path: &Path, parts: &[PathBuf]) -> StitchResult<()> {
    let mut file = std::fs::File::create(path)?;
    for part in parts {
        let escaped = part.display().to_string().replace('\'', "'\\''");
        writeln!(file, "file '{escaped}'")?;
    }
    file.flush()?;
    Ok(())
}
