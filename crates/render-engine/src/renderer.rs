//! Bounded-parallel chunk rendering.
//!
//! Each chunk moves through `Pending -> Rendering -> Rendered | Failed`.
//! A failed chunk never stops its siblings; the report lists every outcome
//! and the finalizer decides what to do with failures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use stitcher_common::error::StitchError;
use stitcher_timeline::period::Period;

use crate::compose::Chunk;
use crate::engine::{MediaEngine, RenderJob};

/// Per-chunk render state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Rendering,
    Rendered { path: PathBuf },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub period: Period,
    pub state: ChunkState,
}

/// Outcomes of every chunk, ordered by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub outcomes: Vec<ChunkOutcome>,
}

impl RenderReport {
    /// Indices of chunks that did not end up rendered.
    pub fn failures(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.state, ChunkState::Rendered { .. }))
            .map(|o| o.index)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// Rendered chunk files in index order.
    ///
    /// Fails with the list of missing chunks if any did not render.
    pub fn rendered_paths(&self) -> Result<Vec<PathBuf>, StitchError> {
        let failed = self.failures();
        if !failed.is_empty() {
            return Err(StitchError::IncompleteRender { failed });
        }
        Ok(self
            .outcomes
            .iter()
            .filter_map(|o| match &o.state {
                ChunkState::Rendered { path } => Some(path.clone()),
                _ => None,
            })
            .collect())
    }
}

/// Progress snapshot sent after each chunk settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl RenderProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed + self.failed) as f64 / self.total as f64
        }
    }
}

/// Progress callback for chunk rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// File name of chunk `index`.
pub fn chunk_file_name(index: usize, extension: &str) -> String {
    format!("chunk-{index}.{extension}")
}

/// Render every chunk into `scratch`, at most `parallelism` at a time.
pub async fn render_chunks(
    chunks: Vec<Chunk>,
    engine: Arc<dyn MediaEngine>,
    scratch: &Path,
    extension: &str,
    parallelism: usize,
    progress: Option<ProgressCallback>,
) -> RenderReport {
    let total = chunks.len();
    let parallelism = parallelism.max(1);
    tracing::info!(
        chunks = total,
        parallelism,
        engine = engine.name(),
        "Rendering chunks"
    );

    let mut outcomes: Vec<ChunkOutcome> = chunks
        .iter()
        .map(|c| ChunkOutcome {
            index: c.index,
            period: c.period,
            state: ChunkState::Pending,
        })
        .collect();

    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut tasks = JoinSet::new();

    for chunk in chunks {
        let index = chunk.index;
        let destination = scratch.join(chunk_file_name(index, extension));
        let job = RenderJob::Chunk {
            index,
            graph: chunk.graph,
            output: chunk.track,
            destination: destination.clone(),
        };
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        index,
                        ChunkState::Failed {
                            message: "render pool closed".to_string(),
                        },
                    )
                }
            };
            tracing::debug!(chunk = index, state = ?ChunkState::Rendering, "Chunk started");

            let started = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || engine.execute(&job)).await;
            let state = match result {
                Ok(Ok(_)) => ChunkState::Rendered { path: destination },
                Ok(Err(err)) => ChunkState::Failed {
                    message: err.to_string(),
                },
                Err(join_err) => ChunkState::Failed {
                    message: format!("render task aborted: {join_err}"),
                },
            };
            tracing::debug!(
                chunk = index,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Chunk settled"
            );
            (index, state)
        });
    }

    let mut completed = 0;
    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (index, state) = match joined {
            Ok(settled) => settled,
            Err(err) => {
                // The chunk stays Pending and is reported as a failure.
                tracing::error!(error = %err, "Chunk task did not complete");
                failed += 1;
                continue;
            }
        };

        match &state {
            ChunkState::Rendered { path } => {
                completed += 1;
                tracing::info!(chunk = index, path = %path.display(), "Chunk rendered");
            }
            ChunkState::Failed { message } => {
                failed += 1;
                tracing::warn!(chunk = index, error = %message, "Chunk failed");
            }
            ChunkState::Pending | ChunkState::Rendering => {}
        }
        if let Some(outcome) = outcomes.iter_mut().find(|o| o.index == index) {
            outcome.state = state;
        }
        if let Some(cb) = &progress {
            cb(RenderProgress {
                completed,
                failed,
                total,
            });
        }
    }

    outcomes.sort_by_key(|o| o.index);
    let report = RenderReport { outcomes };
    tracing::info!(
        rendered = completed,
        failed = report.failures().len(),
        "Chunk rendering finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCommand, EngineOutput, RecordingEngine};
    use crate::graph::FilterGraph;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use stitcher_common::error::StitchResult;
    use stitcher_timeline::period::Timestamp;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|index| {
                let start = Timestamp::from_micros(index as i64 * 1_000_000);
                let mut graph = FilterGraph::new();
                let track = graph.black(1_000_000, 16, 16, 25);
                Chunk {
                    index,
                    period: Period::starting_at(start, 1_000_000).unwrap(),
                    graph,
                    track,
                }
            })
            .collect()
    }

    /// Counts how many jobs run at once.
    #[derive(Default)]
    struct SlowEngine {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MediaEngine for SlowEngine {
        fn compile(&self, _job: &RenderJob) -> StitchResult<EngineCommand> {
            Ok(EngineCommand {
                program: PathBuf::from("slow"),
                args: Vec::new(),
            })
        }

        fn execute(&self, job: &RenderJob) -> StitchResult<EngineOutput> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            std::fs::write(job.destination(), b"x")?;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(EngineOutput::default())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallelism_is_bounded() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(SlowEngine::default());

        let report = render_chunks(
            chunks(8),
            engine.clone(),
            scratch.path(),
            "webm",
            2,
            None,
        )
        .await;

        assert!(report.is_complete());
        assert!(engine.peak.load(Ordering::SeqCst) <= 2);
        assert!(engine.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(RecordingEngine::failing_chunks([1, 3]));

        let report = render_chunks(
            chunks(5),
            engine.clone(),
            scratch.path(),
            "webm",
            3,
            None,
        )
        .await;

        assert_eq!(report.failures(), vec![1, 3]);
        assert_eq!(engine.chunk_jobs().len(), 5);
        assert!(scratch.path().join("chunk-4.webm").exists());
        assert!(matches!(
            report.rendered_paths(),
            Err(StitchError::IncompleteRender { ref failed }) if failed == &vec![1, 3]
        ));
    }

    #[tokio::test]
    async fn test_outcomes_are_in_index_order_with_progress() {
        let scratch = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::<RenderProgress>::new()));
        let sink = Arc::clone(&seen);

        let report = render_chunks(
            chunks(4),
            Arc::new(RecordingEngine::new()),
            scratch.path(),
            "mkv",
            4,
            Some(Box::new(move |p: RenderProgress| sink.lock().unwrap().push(p))),
        )
        .await;

        let paths = report.rendered_paths().unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["chunk-0.mkv", "chunk-1.mkv", "chunk-2.mkv", "chunk-3.mkv"]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen.last().copied(),
            Some(RenderProgress {
                completed: 4,
                failed: 0,
                total: 4
            })
        );
        assert_eq!(seen.last().unwrap().fraction(), 1.0);
    }
}
