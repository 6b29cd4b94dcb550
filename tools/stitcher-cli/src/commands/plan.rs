//! Print the engine commands a render would run, without running them.

use std::path::PathBuf;

use stitcher_common::config::StitcherConfig;

/// Placeholder for the scratch directory in printed commands.
const SCRATCH_PLACEHOLDER: &str = "$SCRATCH";

pub fn run(config: StitcherConfig, spec_path: PathBuf, debug: bool) -> anyhow::Result<()> {
    let spec = super::read_spec(&spec_path, &config)?;
    let stitcher = super::stitcher(config, &spec.input_root);
    let prepared = stitcher.prepare(&spec.bytes, debug)?;
    let commands = stitcher.plan_commands(&prepared, PathBuf::from(SCRATCH_PLACEHOLDER))?;

    println!(
        "# {} chunk(s), {} engine command(s), key {}",
        prepared.chunks.len(),
        commands.len(),
        prepared.spec.key
    );
    for command in &commands {
        println!("{command}");
    }
    Ok(())
}
