//! Timeline resolution: place every input on the absolute time axis and keep
//! the ones that overlap the output window.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use stitcher_common::error::{StitchError, StitchResult};

use crate::period::{secs_to_micros, Period};
use crate::probe::{InputLocator, MediaProber};
use crate::spec::Spec;
use crate::start_time::{StartTimePolicy, StartTimeSource};

/// An input placed on the absolute timeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInput {
    pub stream_name: String,
    pub path: PathBuf,
    pub period: Period,
    pub has_video: bool,
    pub has_audio: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub start_source: StartTimeSource,
}

/// The output window plus every input that overlaps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTimeline {
    pub output_period: Period,
    pub inputs: Vec<ResolvedInput>,
    /// Stream names dropped for not overlapping the output.
    pub discarded: Vec<String>,
}

impl ResolvedTimeline {
    pub fn input(&self, stream_name: &str) -> Option<&ResolvedInput> {
        self.inputs.iter().find(|i| i.stream_name == stream_name)
    }

    /// Inputs with an audio stream.
    pub fn audio_inputs(&self) -> impl Iterator<Item = &ResolvedInput> {
        self.inputs.iter().filter(|i| i.has_audio)
    }
}

/// Resolve all spec inputs against the output window.
///
/// Any input without a start time fails the whole load.
pub fn resolve(
    spec: &Spec,
    prober: &dyn MediaProber,
    locator: &dyn InputLocator,
    policy: &StartTimePolicy,
) -> StitchResult<ResolvedTimeline> {
    let output_period = spec.output_period();
    let mut inputs = Vec::new();
    let mut discarded = Vec::new();

    for input in spec.inputs() {
        let path = locator.locate(&input.filename)?;
        let probed = prober.probe(&path)?;

        let (start, start_source) = policy
            .resolve(input, &probed)
            .ok_or_else(|| StitchError::missing_start_time(&input.stream_name))?;
        let duration = secs_to_micros(probed.duration_secs)
            .map_err(|e| StitchError::probe(&path, e.to_string()))?;
        let period = Period::starting_at(start, duration)?;

        if !period.overlaps(&output_period) {
            tracing::info!(
                stream = %input.stream_name,
                input_period = %period,
                output_period = %output_period,
                "Discarding input outside the output window"
            );
            discarded.push(input.stream_name.clone());
            continue;
        }

        let dims = probed.video_dimensions();
        tracing::debug!(
            stream = %input.stream_name,
            path = %path.display(),
            period = %period,
            source = %start_source,
            "Resolved input"
        );
        inputs.push(ResolvedInput {
            stream_name: input.stream_name.clone(),
            path,
            period,
            has_video: probed.has_video(),
            has_audio: probed.has_audio(),
            width: dims.map(|(w, _)| w),
            height: dims.map(|(_, h)| h),
            start_source,
        });
    }

    tracing::info!(
        kept = inputs.len(),
        discarded = discarded.len(),
        output_period = %output_period,
        "Timeline resolved"
    );

    Ok(ResolvedTimeline {
        output_period,
        inputs,
        discarded,
    })
}
