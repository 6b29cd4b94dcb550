//! Load a spec and print the resolved timeline.

use std::path::PathBuf;

use stitcher_common::config::StitcherConfig;
use stitcher_timeline::chunk_periods;

pub fn run(config: StitcherConfig, spec_path: PathBuf, json: bool) -> anyhow::Result<()> {
    let spec = super::read_spec(&spec_path, &config)?;
    let stitcher = super::stitcher(config, &spec.input_root);
    let (spec, timeline) = stitcher.load(&spec.bytes)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }
    let framerate = spec.framerate_or(stitcher.config().render.framerate);
    let size = spec.output_size();

    println!("Spec: {}", spec_path.display());
    println!("  Key: {}", spec.key.as_str());
    println!("  Output: {}", timeline.output_period);
    println!("  Size: {}x{} @ {} fps", size.width, size.height, framerate);

    println!();
    let periods = chunk_periods(&spec)?;
    println!("Chunks ({}):", periods.len());
    for (index, period) in periods.iter().enumerate() {
        let streams: Vec<&str> = spec.milestones()[index]
            .videos
            .iter()
            .map(|v| v.stream_name.as_str())
            .collect();
        println!("  [{index}] {period}  {}", streams.join(", "));
    }

    println!();
    println!("Inputs ({}):", timeline.inputs.len());
    for input in &timeline.inputs {
        let mut tracks = Vec::new();
        if input.has_video {
            match (input.width, input.height) {
                (Some(w), Some(h)) => tracks.push(format!("video {w}x{h}")),
                _ => tracks.push("video".to_string()),
            }
        }
        if input.has_audio {
            tracks.push("audio".to_string());
        }
        println!(
            "  {}: {} [{}] start from {}",
            input.stream_name,
            input.period,
            tracks.join(", "),
            input.start_source
        );
    }

    if !timeline.discarded.is_empty() {
        println!();
        println!("Outside output window: {}", timeline.discarded.join(", "));
    }

    println!();
    println!("[OK] Spec is valid");
    Ok(())
}
