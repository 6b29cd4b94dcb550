//! Stitcher Timeline
//!
//! The time model behind a stitched render:
//! - Half-open periods with microsecond precision
//! - Spec documents and their validation
//! - Start-time resolution and the resolved input timeline
//! - Chunk tiling of the output window

pub mod artifact;
pub mod chunks;
pub mod period;
pub mod probe;
pub mod resolve;
pub mod spec;
pub mod start_time;

pub use artifact::{ArtifactKey, OutputArtifact};
pub use chunks::chunk_periods;
pub use period::{format_secs, secs_to_micros, Period, Timestamp, MICROS_PER_SEC};
pub use probe::{InputLocator, MediaProber, ProbedInput, ProbedStream};
pub use resolve::{resolve, ResolvedInput, ResolvedTimeline};
pub use spec::{InputRef, Milestone, OutputSize, Spec, SpecDocument, VideoPlacement};
pub use start_time::{StartTimePolicy, StartTimeSource};
