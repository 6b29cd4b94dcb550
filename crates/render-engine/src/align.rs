//! Input alignment: fit one input onto a target period.
//!
//! ```text
//! target      |-------------------------------|
//! input            |==========================|=====|
//!             lead   content (trimmed)
//!
//! target      |-------------------------------|
//! input   |=====|=================|
//!          trim    content          tail
//! ```
//!
//! The leading gap and the trailing gap are filled with black or silence,
//! so the result always spans the target exactly.

use serde::{Deserialize, Serialize};

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::period::{Period, Timestamp};
use stitcher_timeline::resolve::ResolvedInput;

use crate::graph::{Edge, FilterGraph, MediaKind, Track};

/// How an input maps onto a target period. All values in microseconds.
///
/// `lead_filler + content + tail_filler` always equals the target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    /// Filler before the input starts.
    pub lead_filler: i64,
    /// Offset into the input where content begins.
    pub trim_start: i64,
    /// Length of input content used.
    pub content: i64,
    /// Filler after the input ends.
    pub tail_filler: i64,
}

impl AlignmentPlan {
    pub fn new(input: Period, target: Period) -> StitchResult<Self> {
        let overlap = input.intersect(&target).ok_or_else(|| {
            StitchError::alignment(format!(
                "input {input} does not intersect target {target}"
            ))
        })?;
        let micros = |a: Timestamp, b: Timestamp| b.as_micros() - a.as_micros();
        Ok(Self {
            lead_filler: micros(target.start(), overlap.start()),
            trim_start: micros(input.start(), overlap.start()),
            content: overlap.duration_micros(),
            tail_filler: micros(overlap.end(), target.end()),
        })
    }

    /// Target start minus input start. Positive means trim, negative means pad.
    pub fn stream_delay(&self) -> i64 {
        self.trim_start - self.lead_filler
    }

    pub fn total_micros(&self) -> i64 {
        self.lead_filler + self.content + self.tail_filler
    }
}

/// Align an input's video to `target`, letterboxed into `width`x`height`.
///
/// With `burn_in` set, the input's own wall-clock time is drawn along the
/// top edge before trimming, so it reads true for the input, not the chunk.
pub fn align_video(
    graph: &mut FilterGraph,
    input: &ResolvedInput,
    target: Period,
    width: u32,
    height: u32,
    fps: u32,
    burn_in: bool,
) -> StitchResult<Track> {
    if width == 0 || height == 0 {
        return Err(StitchError::alignment(format!(
            "target size {width}x{height} for '{}' must be positive",
            input.stream_name
        )));
    }
    if !input.has_video {
        return Err(StitchError::alignment(format!(
            "input '{}' has no video stream",
            input.stream_name
        )));
    }
    let plan = AlignmentPlan::new(input.period, target)?;
    tracing::debug!(stream = %input.stream_name, ?plan, "Aligning video");

    let mut source = graph.source(&input.path, MediaKind::Video);
    if burn_in {
        source = graph.burn_timestamp(source, input.period.start(), Edge::Top);
    }
    let content = graph.trim(source, plan.trim_start, plan.content);
    let content = graph.scale_letterbox(content, width, height);

    let mut segments = Vec::with_capacity(3);
    if plan.lead_filler > 0 {
        segments.push(graph.black(plan.lead_filler, width, height, fps));
    }
    segments.push(content);
    if plan.tail_filler > 0 {
        segments.push(graph.black(plan.tail_filler, width, height, fps));
    }
    let joined = graph.concat(&segments)?;
    Ok(graph.framerate(joined, fps))
}

/// Align an input's audio to `target`, padding with silence.
pub fn align_audio(
    graph: &mut FilterGraph,
    input: &ResolvedInput,
    target: Period,
    sample_rate: u32,
) -> StitchResult<Track> {
    if !input.has_audio {
        return Err(StitchError::alignment(format!(
            "input '{}' has no audio stream",
            input.stream_name
        )));
    }
    let plan = AlignmentPlan::new(input.period, target)?;
    tracing::debug!(stream = %input.stream_name, ?plan, "Aligning audio");

    let source = graph.source(&input.path, MediaKind::Audio);
    let content = graph.trim(source, plan.trim_start, plan.content);

    let mut segments = Vec::with_capacity(3);
    if plan.lead_filler > 0 {
        segments.push(graph.silence(plan.lead_filler, sample_rate));
    }
    segments.push(content);
    if plan.tail_filler > 0 {
        segments.push(graph.silence(plan.tail_filler, sample_rate));
    }
    graph.concat(&segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;
    use stitcher_timeline::StartTimeSource;

    fn period(start: i64, end: i64) -> Period {
        Period::new(Timestamp::from_micros(start), Timestamp::from_micros(end)).unwrap()
    }

    fn input(p: Period) -> ResolvedInput {
        ResolvedInput {
            stream_name: "cam".to_string(),
            path: PathBuf::from("/in/cam.webm"),
            period: p,
            has_video: true,
            has_audio: true,
            width: Some(1280),
            height: Some(720),
            start_source: StartTimeSource::Explicit,
        }
    }

    #[test]
    fn test_input_covering_target_is_trimmed() {
        let plan = AlignmentPlan::new(period(0, 100), period(20, 50)).unwrap();
        assert_eq!(
            plan,
            AlignmentPlan {
                lead_filler: 0,
                trim_start: 20,
                content: 30,
                tail_filler: 0
            }
        );
        assert_eq!(plan.stream_delay(), 20);
    }

    #[test]
    fn test_input_inside_target_is_padded_both_ends() {
        let plan = AlignmentPlan::new(period(30, 60), period(0, 100)).unwrap();
        assert_eq!(plan.lead_filler, 30);
        assert_eq!(plan.trim_start, 0);
        assert_eq!(plan.content, 30);
        assert_eq!(plan.tail_filler, 40);
        assert_eq!(plan.stream_delay(), -30);
    }

    #[test]
    fn test_disjoint_input_is_alignment_error() {
        let err = AlignmentPlan::new(period(0, 10), period(10, 20)).unwrap_err();
        assert!(matches!(err, StitchError::Alignment { .. }));
    }

    #[test]
    fn test_align_video_late_start() {
        // Input starts 3s into a 10s target and runs past its end.
        let mut graph = FilterGraph::new();
        let track = align_video(
            &mut graph,
            &input(period(3_000_000, 20_000_000)),
            period(0, 10_000_000),
            640,
            360,
            25,
            false,
        )
        .unwrap();

        assert_eq!(graph.duration_micros(track), Some(10_000_000));
        let compiled = graph.compile(track, 0).unwrap();
        assert!(compiled
            .filter_complex
            .contains("color=c=black:s=640x360:r=25:d=3.000000"));
        assert!(compiled
            .filter_complex
            .contains("trim=start=0.000000:duration=7.000000"));
        assert!(compiled.filter_complex.contains("concat=n=2:v=1:a=0"));
        assert!(compiled.filter_complex.ends_with("fps=25[n5]"));
    }

    #[test]
    fn test_align_video_rejects_zero_size() {
        let mut graph = FilterGraph::new();
        let err = align_video(
            &mut graph,
            &input(period(0, 10)),
            period(0, 10),
            0,
            360,
            25,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, StitchError::Alignment { .. }));
    }

    #[test]
    fn test_align_video_burns_input_time_before_trim() {
        // Input started 4s before the target, so 4s get trimmed off.
        let mut graph = FilterGraph::new();
        let track = align_video(
            &mut graph,
            &input(period(1_589_462_396_000_000, 1_589_462_410_000_000)),
            period(1_589_462_400_000_000, 1_589_462_405_000_000),
            640,
            360,
            25,
            true,
        )
        .unwrap();
        let compiled = graph.compile(track, 0).unwrap();
        let burn = compiled
            .filter_complex
            .find("gmtime\\:1589462396.000000")
            .unwrap();
        let trim = compiled.filter_complex.find("trim=start=4.000000").unwrap();
        assert!(burn < trim);
        assert!(compiled.filter_complex.contains("x=0:y=0"));
        assert_eq!(graph.duration_micros(track), Some(5_000_000));
    }

    #[test]
    fn test_align_audio_pads_with_silence() {
        let mut graph = FilterGraph::new();
        let track = align_audio(
            &mut graph,
            &input(period(2_000_000, 5_000_000)),
            period(0, 10_000_000),
            48_000,
        )
        .unwrap();
        assert_eq!(graph.duration_micros(track), Some(10_000_000));
        let compiled = graph.compile(track, 0).unwrap();
        assert!(compiled.filter_complex.contains("concat=n=3:v=0:a=1"));
    }

    proptest! {
        #[test]
        fn prop_plan_spans_target(
            is in -50_000_000i64..50_000_000, il in 1i64..50_000_000,
            ts in -50_000_000i64..50_000_000, tl in 1i64..50_000_000,
        ) {
            let input = period(is, is + il);
            let target = period(ts, ts + tl);
            match AlignmentPlan::new(input, target) {
                Ok(plan) => {
                    prop_assert_eq!(plan.total_micros(), target.duration_micros());
                    prop_assert!(plan.lead_filler >= 0 && plan.tail_filler >= 0);
                    prop_assert!(plan.trim_start >= 0);
                    prop_assert!(plan.trim_start + plan.content <= il);
                }
                Err(_) => prop_assert!(!input.overlaps(&target)),
            }
        }
    }
}
