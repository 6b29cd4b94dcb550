//! Audio mixing across the whole output window.

use stitcher_common::error::StitchResult;
use stitcher_timeline::resolve::ResolvedTimeline;

use crate::align::align_audio;
use crate::graph::{FilterGraph, Track};

/// The output's single audio track.
#[derive(Debug, Clone)]
pub struct AudioMix {
    pub graph: FilterGraph,
    pub track: Track,
    /// Streams that contributed audio.
    pub streams: Vec<String>,
}

/// Align every audio-bearing input to the output period and mix them.
///
/// No inputs gives silence; one input is used as is.
pub fn mix_audio(timeline: &ResolvedTimeline, sample_rate: u32) -> StitchResult<AudioMix> {
    let output = timeline.output_period;
    let mut graph = FilterGraph::new();
    let mut tracks = Vec::new();
    let mut streams = Vec::new();

    for input in timeline.audio_inputs() {
        if !input.period.overlaps(&output) {
            continue;
        }
        tracks.push(align_audio(&mut graph, input, output, sample_rate)?);
        streams.push(input.stream_name.clone());
    }

    let track = match tracks.as_slice() {
        [] => graph.silence(output.duration_micros(), sample_rate),
        [single] => *single,
        many => graph.mix(many)?,
    };

    tracing::info!(inputs = streams.len(), "Audio mix prepared");
    Ok(AudioMix {
        graph,
        track,
        streams,
    })
}
