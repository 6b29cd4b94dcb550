//! Chunk tiling: one chunk per milestone.

use stitcher_common::error::StitchResult;

use crate::period::{secs_to_micros, Period};
use crate::spec::Spec;

/// Absolute chunk periods, one per milestone, in milestone order.
///
/// Chunk `i` runs from milestone `i` to milestone `i + 1`, the last one to
/// the end of the output. The result tiles the output period exactly.
pub fn chunk_periods(spec: &Spec) -> StitchResult<Vec<Period>> {
    let output = spec.output_period();
    let origin = output.start();
    let mut bounds = spec
        .milestones()
        .iter()
        .map(|m| origin.offset_micros(secs_to_micros(m.timestamp)?))
        .collect::<StitchResult<Vec<_>>>()?;
    bounds.push(output.end());

    bounds
        .windows(2)
        .map(|w| Period::new(w[0], w[1]))
        .collect()
}
