//! ffmpeg-backed media engine.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use stitcher_common::config::RenderDefaults;
use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::period::format_secs;

use crate::engine::{EngineCommand, EngineOutput, MediaEngine, RenderJob};

/// Runs render jobs through the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegEngine {
    pub fn from_config(config: &RenderDefaults) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }

    /// Whether the configured binary can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn base_args() -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
        ]
    }

    fn compile_args(&self, job: &RenderJob) -> StitchResult<Vec<String>> {
        let mut args = Self::base_args();
        match job {
            RenderJob::Chunk {
                graph,
                output,
                destination,
                ..
            } => {
                let compiled = graph.compile(*output, 0)?;
                for input in &compiled.inputs {
                    args.push("-i".to_string());
                    args.push(input.display().to_string());
                }
                if !compiled.filter_complex.is_empty() {
                    args.push("-filter_complex".to_string());
                    args.push(compiled.filter_complex);
                }
                args.extend(["-map".to_string(), compiled.output, "-an".to_string()]);
                // Duplicate and drop frames to hold the requested rate exactly.
                args.extend(["-fps_mode", "cfr", "-copytb", "1"].map(String::from));
                args.extend(video_codec_args(&self.video_codec));
                args.push(destination.display().to_string());
            }
            RenderJob::Concat {
                list_file,
                destination,
                ..
            } => {
                args.extend(["-safe", "0", "-f", "concat", "-i"].map(String::from));
                args.push(list_file.display().to_string());
                args.extend(["-c", "copy"].map(String::from));
                args.push(destination.display().to_string());
            }
            RenderJob::Mux {
                video,
                audio_graph,
                audio,
                duration_micros,
                destination,
            } => {
                args.push("-i".to_string());
                args.push(video.display().to_string());
                let compiled = audio_graph.compile(*audio, 1)?;
                for input in &compiled.inputs {
                    args.push("-i".to_string());
                    args.push(input.display().to_string());
                }
                if !compiled.filter_complex.is_empty() {
                    args.push("-filter_complex".to_string());
                    args.push(compiled.filter_complex);
                }
                args.extend(["-map".to_string(), "0:v:0".to_string()]);
                args.extend(["-map".to_string(), compiled.output]);
                args.extend(["-c:v".to_string(), "copy".to_string()]);
                args.extend(audio_codec_args(&self.audio_codec));
                args.extend(["-t".to_string(), format_secs(*duration_micros)]);
                args.push(destination.display().to_string());
            }
        }
        Ok(args)
    }

    fn run(&self, job: &RenderJob, command: &EngineCommand) -> StitchResult<EngineOutput> {
        tracing::debug!(command = %command, "Running ffmpeg");
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| self.failure(job, format!("failed to start ffmpeg: {e}")))?;

        tracing::debug!(pid = child.id(), job = %job.label(), "ffmpeg process started");

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.failure(job, "failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let status = child
            .wait()
            .map_err(|e| self.failure(job, format!("failed to wait on ffmpeg: {e}")))?;

        let diagnostics = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(self.failure(
                job,
                format!("ffmpeg exited with {status}: {}", last_lines(&diagnostics, 20)),
            ));
        }

        tracing::debug!(
            job = %job.label(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(EngineOutput { diagnostics })
    }

    fn failure(&self, job: &RenderJob, message: impl Into<String>) -> StitchError {
        match job {
            RenderJob::Chunk { index, .. } => StitchError::chunk_render(*index, message),
            _ => StitchError::engine("ffmpeg", message),
        }
    }
}

impl MediaEngine for FfmpegEngine {
    fn compile(&self, job: &RenderJob) -> StitchResult<EngineCommand> {
        Ok(EngineCommand {
            program: self.binary.clone(),
            args: self.compile_args(job)?,
        })
    }

    fn execute(&self, job: &RenderJob) -> StitchResult<EngineOutput> {
        let command = self.compile(job)?;
        self.run(job, &command)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn video_codec_args(codec: &str) -> Vec<String> {
    let args: &[&str] = match codec {
        "libvpx-vp9" => &[
            "-c:v",
            "libvpx-vp9",
            "-crf",
            "32",
            "-b:v",
            "0",
            "-row-mt",
            "1",
            "-pix_fmt",
            "yuv420p",
        ],
        "libx264" => &[
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-pix_fmt",
            "yuv420p",
        ],
        other => return vec!["-c:v".to_string(), other.to_string()],
    };
    args.iter().map(|s| s.to_string()).collect()
}

fn audio_codec_args(codec: &str) -> Vec<String> {
    let args: &[&str] = match codec {
        "libopus" => &["-c:a", "libopus", "-b:a", "128k"],
        "aac" => &["-c:a", "aac", "-b:a", "160k"],
        other => return vec!["-c:a".to_string(), other.to_string()],
    };
    args.iter().map(|s| s.to_string()).collect()
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Whether `binary` resolves to an executable.
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {} >/dev/null 2>&1", binary.display()))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
