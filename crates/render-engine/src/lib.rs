//! Stitcher Render Engine
//!
//! Turns a resolved timeline into a finished video by delegating every
//! pixel and sample operation to a media engine.
//!
//! # Pipeline Architecture
//!
//! ```text
//! spec.json ──┐
//!             ├── Resolve (probe inputs, place on timeline)
//! inputs ─────┘         │
//!                       ├──────────────────────────┐
//!                       ▼                          ▼
//!              Compose chunks                 Mix audio
//!          (align, letterbox, overlay)   (align, pad, amix)
//!                       │                          │
//!                       ▼                          │
//!         Render chunks (bounded parallel)         │
//!                       │                          │
//!                       ▼                          │
//!              Concat (stream copy)                │
//!                       │                          │
//!                       └────────── Mux ───────────┘
//!                                    │
//!                                    ▼
//!                            <key>.<container>
//! ```

pub mod align;
pub mod compose;
pub mod engine;
pub mod ffmpeg;
pub mod finalize;
pub mod graph;
pub mod mix;
pub mod pipeline;
pub mod probe;
pub mod renderer;
pub mod scratch;
pub mod storage;

pub use align::{align_audio, align_video, AlignmentPlan};
pub use compose::{compose_chunks, Chunk};
pub use engine::{EngineCommand, EngineOutput, MediaEngine, RecordingEngine, RenderJob};
pub use ffmpeg::FfmpegEngine;
pub use finalize::{finalize, FinalizeOutcome, FinalizeRequest};
pub use graph::{Edge, FilterGraph, MediaKind, Track};
pub use mix::{mix_audio, AudioMix};
pub use pipeline::{PreparedRender, Services, Stitcher};
pub use probe::FfprobeProber;
pub use renderer::{
    render_chunks, ChunkOutcome, ChunkState, ProgressCallback, RenderProgress, RenderReport,
};
pub use scratch::ScratchDir;
pub use storage::{ArtifactStore, LocalArtifactStore, LocalLocator};
