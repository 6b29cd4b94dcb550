//! Check that the media tools are available.

use stitcher_common::config::StitcherConfig;
use stitcher_render_engine::ffmpeg::command_exists;

pub fn run(config: &StitcherConfig) -> anyhow::Result<()> {
    println!("Stitcher System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", &config.render.ffmpeg_path),
        ("ffprobe", &config.render.ffprobe_path),
    ];
    let mut all_ok = true;
    for (name, path) in tools {
        if command_exists(path) {
            println!("[OK] {name}: {}", path.display());
        } else {
            all_ok = false;
            println!("[MISSING] {name}: {}", path.display());
        }
    }

    println!(
        "[OK] Parallelism: {} chunk(s) at a time",
        config.render.effective_parallelism()
    );
    println!(
        "[OK] Output: {} ({} / {})",
        config.storage.output_dir.display(),
        config.render.video_codec,
        config.render.audio_codec
    );

    println!();
    if all_ok {
        println!("All required tools are available. Stitcher is ready.");
        Ok(())
    } else {
        anyhow::bail!("required media tools are missing")
    }
}
