//! Media engine interface.
//!
//! The pipeline never touches pixels or samples. It hands [`RenderJob`]s to a
//! [`MediaEngine`], which either turns them into commands for an external
//! tool or, for tests and dry runs, just records them.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::period::format_secs;

use crate::graph::{FilterGraph, Track};

/// One unit of work for a media engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderJob {
    /// Encode one chunk's video graph to a file.
    Chunk {
        index: usize,
        graph: FilterGraph,
        output: Track,
        destination: PathBuf,
    },
    /// Stream-copy the parts, in order, into one file.
    Concat {
        list_file: PathBuf,
        parts: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Combine a finished video file with a mixed audio graph.
    Mux {
        video: PathBuf,
        audio_graph: FilterGraph,
        audio: Track,
        duration_micros: i64,
        destination: PathBuf,
    },
}

impl RenderJob {
    pub fn destination(&self) -> &Path {
        match self {
            RenderJob::Chunk { destination, .. }
            | RenderJob::Concat { destination, .. }
            | RenderJob::Mux { destination, .. } => destination,
        }
    }

    /// Short description for logs.
    pub fn label(&self) -> String {
        match self {
            RenderJob::Chunk { index, .. } => format!("chunk {index}"),
            RenderJob::Concat { parts, .. } => format!("concat of {} parts", parts.len()),
            RenderJob::Mux {
                duration_micros, ..
            } => format!("mux ({}s)", format_secs(*duration_micros)),
        }
    }
}

/// A concrete external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Result of a successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Captured tool output (stderr for ffmpeg).
    pub diagnostics: String,
}

/// Something that can execute render jobs.
///
/// `execute` blocks until the job finishes.
pub trait MediaEngine: Send + Sync {
    /// Translate a job without running it.
    fn compile(&self, job: &RenderJob) -> StitchResult<EngineCommand>;

    /// Run a job to completion.
    fn execute(&self, job: &RenderJob) -> StitchResult<EngineOutput>;

    fn name(&self) -> &str;
}

/// Engine that records jobs instead of running them.
///
/// Chunk and mux jobs write a small placeholder file at their destination.
/// Concat jobs write the parts' contents back to back, so the output shows
/// the order parts were joined in.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    jobs: Mutex<Vec<RenderJob>>,
    failing_chunks: HashSet<usize>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every chunk job whose index is in `indices`.
    pub fn failing_chunks(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failing_chunks: indices.into_iter().collect(),
        }
    }

    /// Every job executed so far, in execution order.
    pub fn jobs(&self) -> Vec<RenderJob> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn chunk_jobs(&self) -> Vec<RenderJob> {
        self.jobs()
            .into_iter()
            .filter(|j| matches!(j, RenderJob::Chunk { .. }))
            .collect()
    }

    fn record(&self, job: &RenderJob) {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(job.clone());
    }
}

impl MediaEngine for RecordingEngine {
    fn compile(&self, job: &RenderJob) -> StitchResult<EngineCommand> {
        let mut args = vec![job.label()];
        match job {
            RenderJob::Chunk { graph, output, .. } => {
                args.push(graph.compile(*output, 0)?.filter_complex);
            }
            RenderJob::Concat { parts, .. } => {
                args.extend(parts.iter().map(|p| p.display().to_string()));
            }
            RenderJob::Mux {
                video,
                audio_graph,
                audio,
                ..
            } => {
                args.push(video.display().to_string());
                args.push(audio_graph.compile(*audio, 1)?.filter_complex);
            }
        }
        args.push(job.destination().display().to_string());
        Ok(EngineCommand {
            program: PathBuf::from("record"),
            args,
        })
    }

    fn execute(&self, job: &RenderJob) -> StitchResult<EngineOutput> {
        let command = self.compile(job)?;
        self.record(job);

        if let RenderJob::Chunk { index, .. } = job {
            if self.failing_chunks.contains(index) {
                return Err(StitchError::chunk_render(*index, "simulated failure"));
            }
        }

        let contents = match job {
            RenderJob::Concat { parts, .. } => {
                let mut joined = Vec::new();
                for part in parts {
                    joined.extend(std::fs::read(part)?);
                }
                joined
            }
            _ => format!("{}\n", job.label()).into_bytes(),
        };
        std::fs::write(job.destination(), contents)?;

        Ok(EngineOutput {
            diagnostics: command.to_string(),
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}
