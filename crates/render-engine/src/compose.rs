//! Chunk composition: one render graph per milestone.

use stitcher_common::error::StitchResult;
use stitcher_timeline::chunks::chunk_periods;
use stitcher_timeline::period::Period;
use stitcher_timeline::resolve::ResolvedTimeline;
use stitcher_timeline::spec::{Milestone, Spec};

use crate::align::align_video;
use crate::graph::{Edge, FilterGraph, Track};

/// One rendered segment of the output, spanning a single milestone.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub period: Period,
    pub graph: FilterGraph,
    pub track: Track,
}

/// Build one chunk per milestone.
///
/// The first video of a milestone is the base layer; later ones are drawn
/// over it at their `(x, y)`. With `debug` set, each chunk carries the
/// wall-clock time burned into its bottom-left corner and each input its
/// own recording time along the top.
pub fn compose_chunks(
    spec: &Spec,
    timeline: &ResolvedTimeline,
    framerate: u32,
    debug: bool,
) -> StitchResult<Vec<Chunk>> {
    let chunks = chunk_periods(spec)?
        .into_iter()
        .zip(spec.milestones())
        .enumerate()
        .map(|(index, (period, milestone))| {
            compose_chunk(spec, timeline, index, period, milestone, framerate, debug)
        })
        .collect::<StitchResult<Vec<_>>>()?;

    let burn_in = debug;
    tracing::info!(chunks = chunks.len(), framerate, burn_in, "Composed chunks");
    Ok(chunks)
}

fn compose_chunk(
    spec: &Spec,
    timeline: &ResolvedTimeline,
    index: usize,
    period: Period,
    milestone: &Milestone,
    framerate: u32,
    debug: bool,
) -> StitchResult<Chunk> {
    let output_size = spec.output_size();
    let duration = period.duration_micros();
    let mut graph = FilterGraph::new();
    let mut composed: Option<Track> = None;

    for placement in &milestone.videos {
        let size = placement.size_or(output_size);
        let (x, y) = placement.position();

        let usable = timeline
            .input(&placement.stream_name)
            .filter(|input| input.has_video && input.period.overlaps(&period));
        let layer = match usable {
            Some(input) => {
                align_video(
                &mut graph,
                input,
                period,
                size.width,
                size.height,
                framerate,
                debug,
            )?
            }
            None => {
                tracing::warn!(
                    chunk = index,
                    stream = %placement.stream_name,
                    "No video for this chunk, substituting black"
                );
                graph.black(duration, size.width, size.height, framerate)
            }
        };

        composed = Some(match composed {
            None if size == output_size && (x, y) == (0, 0) => layer,
            None => {
                let canvas =
                    graph.black(duration, output_size.width, output_size.height, framerate);
                graph.overlay(canvas, layer, x, y)
            }
            Some(base) => graph.overlay(base, layer, x, y),
        });
    }

    let mut track = match composed {
        Some(track) => track,
        None => {
            tracing::warn!(chunk = index, "Milestone has no videos, rendering black");
            graph.black(duration, output_size.width, output_size.height, framerate)
        }
    };
    if debug {
        track = graph.burn_timestamp(track, period.start(), Edge::Bottom);
    }

    tracing::debug!(chunk = index, period = %period, nodes = graph.len(), "Composed chunk");
    Ok(Chunk {
        index,
        period,
        graph,
        track,
    })
}
