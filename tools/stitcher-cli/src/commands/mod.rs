pub mod check;
pub mod plan;
pub mod render;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use stitcher_common::config::StitcherConfig;
use stitcher_render_engine::{
    FfmpegEngine, FfprobeProber, LocalArtifactStore, LocalLocator, Services, Stitcher,
};

/// Raw spec bytes plus the directory relative inputs resolve against.
pub struct SpecFile {
    pub bytes: Vec<u8>,
    pub input_root: PathBuf,
}

pub fn read_spec(path: &Path, config: &StitcherConfig) -> anyhow::Result<SpecFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read spec {}", path.display()))?;
    Ok(SpecFile {
        bytes,
        input_root: input_root(path, config),
    })
}

/// Configured input root, or the spec file's directory.
fn input_root(spec: &Path, config: &StitcherConfig) -> PathBuf {
    config.storage.input_root.clone().unwrap_or_else(|| {
        spec.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Wire the pipeline to ffprobe, ffmpeg and the local filesystem.
pub fn stitcher(config: StitcherConfig, input_root: &Path) -> Stitcher {
    let services = Services {
        prober: Arc::new(FfprobeProber::new(&config.render.ffprobe_path)),
        locator: Arc::new(LocalLocator::new(input_root)),
        engine: Arc::new(FfmpegEngine::from_config(&config.render)),
        store: config.storage.publish_dir.as_ref().map(|dir| {
            Arc::new(LocalArtifactStore::new(dir, &config.render.container))
                as Arc<dyn stitcher_render_engine::ArtifactStore>
        }),
    };
    Stitcher::new(config, services)
}
