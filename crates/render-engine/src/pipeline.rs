//! Staged render pipeline.
//!
//! `load -> resolve -> compose + mix -> render chunks -> finalize`, with every
//! external collaborator injected through [`Services`].

use std::path::PathBuf;
use std::sync::Arc;

use stitcher_common::config::StitcherConfig;
use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::artifact::OutputArtifact;
use stitcher_timeline::probe::{InputLocator, MediaProber};
use stitcher_timeline::resolve::{resolve, ResolvedTimeline};
use stitcher_timeline::spec::Spec;
use stitcher_timeline::start_time::StartTimePolicy;

use crate::compose::{compose_chunks, Chunk};
use crate::engine::{EngineCommand, MediaEngine, RenderJob};
use crate::finalize::{artifact_path, finalize, FinalizeOutcome, FinalizeRequest, CONCAT_LIST_FILE};
use crate::mix::{mix_audio, AudioMix};
use crate::renderer::{chunk_file_name, render_chunks, ProgressCallback};
use crate::scratch::ScratchDir;
use crate::storage::ArtifactStore;

/// External collaborators used by the pipeline.
#[derive(Clone)]
pub struct Services {
    pub prober: Arc<dyn MediaProber>,
    pub locator: Arc<dyn InputLocator>,
    pub engine: Arc<dyn MediaEngine>,
    /// Where finished artifacts are published, if anywhere.
    pub store: Option<Arc<dyn ArtifactStore>>,
}

/// A spec taken through every stage up to, but not including, rendering.
#[derive(Debug, Clone)]
pub struct PreparedRender {
    pub spec: Spec,
    pub timeline: ResolvedTimeline,
    pub chunks: Vec<Chunk>,
    pub audio: AudioMix,
    pub framerate: u32,
}

/// Entry point: turns spec bytes into an output artifact.
#[derive(Clone)]
pub struct Stitcher {
    config: StitcherConfig,
    services: Services,
    policy: StartTimePolicy,
}

impl Stitcher {
    pub fn new(config: StitcherConfig, services: Services) -> Self {
        Self {
            config,
            services,
            policy: StartTimePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StartTimePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &StitcherConfig {
        &self.config
    }

    fn extension(&self) -> &str {
        &self.config.render.container
    }

    /// Parse, validate and resolve a spec. Fails fast on load-time errors.
    pub fn load(&self, spec_bytes: &[u8]) -> StitchResult<(Spec, ResolvedTimeline)> {
        let spec = Spec::from_bytes(spec_bytes)?;
        tracing::info!(
            key = %spec.key,
            output = %spec.output_period(),
            milestones = spec.milestones().len(),
            inputs = spec.inputs().len(),
            "Spec loaded"
        );
        let timeline = resolve(
            &spec,
            self.services.prober.as_ref(),
            self.services.locator.as_ref(),
            &self.policy,
        )?;
        Ok((spec, timeline))
    }

    /// Load a spec and build every render graph.
    pub fn prepare(&self, spec_bytes: &[u8], debug: bool) -> StitchResult<PreparedRender> {
        let (spec, timeline) = self.load(spec_bytes)?;
        let framerate = spec.framerate_or(self.config.render.framerate);
        let chunks = compose_chunks(&spec, &timeline, framerate, debug)?;
        let audio = mix_audio(&timeline, self.config.render.audio_sample_rate)?;
        Ok(PreparedRender {
            spec,
            timeline,
            chunks,
            audio,
            framerate,
        })
    }

    /// Engine commands a render would run, with `scratch` standing in for
    /// the scratch directory.
    pub fn plan_commands(
        &self,
        prepared: &PreparedRender,
        scratch: PathBuf,
    ) -> StitchResult<Vec<EngineCommand>> {
        let engine = self.services.engine.as_ref();
        let ext = self.extension();
        let mut commands = Vec::with_capacity(prepared.chunks.len() + 2);
        let mut parts = Vec::with_capacity(prepared.chunks.len());

        for chunk in &prepared.chunks {
            let destination = scratch.join(chunk_file_name(chunk.index, ext));
            parts.push(destination.clone());
            commands.push(engine.compile(&RenderJob::Chunk {
                index: chunk.index,
                graph: chunk.graph.clone(),
                output: chunk.track,
                destination,
            })?);
        }

        let video = scratch.join(format!("video.{ext}"));
        commands.push(engine.compile(&RenderJob::Concat {
            list_file: scratch.join(CONCAT_LIST_FILE),
            parts,
            destination: video.clone(),
        })?);
        commands.push(engine.compile(&RenderJob::Mux {
            video,
            audio_graph: prepared.audio.graph.clone(),
            audio: prepared.audio.track,
            duration_micros: prepared.spec.output_period().duration_micros(),
            destination: artifact_path(&self.config.storage.output_dir, &prepared.spec.key, ext),
        })?);
        Ok(commands)
    }

    /// Render a spec to its artifact.
    ///
    /// `parallelism` overrides the configured chunk concurrency.
    pub async fn render(
        &self,
        spec_bytes: &[u8],
        parallelism: Option<usize>,
        debug: bool,
    ) -> StitchResult<OutputArtifact> {
        self.render_with_progress(spec_bytes, parallelism, debug, None)
            .await
    }

    pub async fn render_with_progress(
        &self,
        spec_bytes: &[u8],
        parallelism: Option<usize>,
        debug: bool,
        progress: Option<ProgressCallback>,
    ) -> StitchResult<OutputArtifact> {
        let started = std::time::Instant::now();
        let ext = self.extension().to_string();
        let output_dir = self.config.storage.output_dir.clone();

        // Cheap check before probing anything.
        let spec = Spec::from_bytes(spec_bytes)?;
        let existing = artifact_path(&output_dir, &spec.key, &ext);
        if existing.is_file() {
            tracing::info!(path = %existing.display(), "Artifact already rendered");
            return Ok(OutputArtifact {
                key: spec.key,
                local_path: existing,
            });
        }
        if let Some(store) = &self.services.store {
            if store.exists(&spec.key)? {
                let location = store.location(&spec.key);
                tracing::info!(path = %location.display(), "Artifact already published");
                return Ok(OutputArtifact {
                    key: spec.key,
                    local_path: location,
                });
            }
        }

        let this = self.clone();
        let bytes = spec_bytes.to_vec();
        let prepared = tokio::task::spawn_blocking(move || this.prepare(&bytes, debug))
            .await
            .map_err(|e| StitchError::Other(anyhow::anyhow!("prepare task failed: {e}")))??;

        let scratch = ScratchDir::create(&self.config.scratch, debug)?;
        let parallelism = parallelism
            .unwrap_or_else(|| self.config.render.effective_parallelism())
            .max(1);
        let duration_micros = prepared.spec.output_period().duration_micros();
        let key = prepared.spec.key.clone();

        let report = render_chunks(
            prepared.chunks,
            Arc::clone(&self.services.engine),
            scratch.path(),
            &ext,
            parallelism,
            progress,
        )
        .await;

        let engine = Arc::clone(&self.services.engine);
        let scratch_path = scratch.path().to_path_buf();
        let audio = prepared.audio;
        let finalize_key = key.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            finalize(
                FinalizeRequest {
                    key: &finalize_key,
                    report: &report,
                    audio,
                    duration_micros,
                    scratch: &scratch_path,
                    output_dir: &output_dir,
                    extension: &ext,
                },
                engine.as_ref(),
            )
        })
        .await
        .map_err(|e| StitchError::Other(anyhow::anyhow!("finalize task failed: {e}")))??;

        let artifact = match outcome {
            FinalizeOutcome::Produced(artifact) => {
                if let Some(store) = &self.services.store {
                    store.publish(&artifact)?;
                }
                artifact
            }
            FinalizeOutcome::AlreadyPresent(artifact) => artifact,
        };

        tracing::info!(
            key = %key,
            path = %artifact.local_path.display(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Render finished"
        );
        Ok(artifact)
    }
}
