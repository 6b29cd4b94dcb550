//! Render a spec to its output artifact.

use std::io::Write;
use std::path::PathBuf;

use stitcher_common::config::StitcherConfig;
use stitcher_render_engine::{FfmpegEngine, ProgressCallback, RenderProgress};

pub async fn run(
    mut config: StitcherConfig,
    spec_path: PathBuf,
    output: Option<PathBuf>,
    jobs: Option<usize>,
    debug: bool,
) -> anyhow::Result<()> {
    if let Some(dir) = output {
        config.storage.output_dir = dir;
    }
    if jobs == Some(0) {
        anyhow::bail!("--jobs must be at least 1");
    }
    if !FfmpegEngine::from_config(&config.render).is_available() {
        anyhow::bail!(
            "{} not found; install ffmpeg or set render.ffmpeg_path",
            config.render.ffmpeg_path.display()
        );
    }

    let spec = super::read_spec(&spec_path, &config)?;
    let parallelism = jobs.unwrap_or_else(|| config.render.effective_parallelism());
    println!("Rendering: {}", spec_path.display());
    println!("  Output dir: {}", config.storage.output_dir.display());
    println!("  Parallelism: {parallelism}");
    if debug {
        println!("  Debug: timestamps burned in, scratch kept");
    }

    let stitcher = super::stitcher(config, &spec.input_root);
    let progress: ProgressCallback = Box::new(|p: RenderProgress| {
        print!("\r  Chunks: {}/{}", p.completed + p.failed, p.total);
        if p.failed > 0 {
            print!(" ({} failed)", p.failed);
        }
        let _ = std::io::stdout().flush();
    });

    let artifact = stitcher
        .render_with_progress(&spec.bytes, Some(parallelism), debug, Some(progress))
        .await;
    println!();
    let artifact = artifact?;

    println!("Render complete: {}", artifact.local_path.display());
    println!("  Key: {}", artifact.key.as_str());
    Ok(())
}
