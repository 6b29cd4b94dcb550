//! Probed media metadata and the collaborator traits that produce it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stitcher_common::error::{StitchError, StitchResult};

/// Container-level facts about one input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbedInput {
    /// Container duration in seconds.
    pub duration_secs: f64,
    pub format_tags: BTreeMap<String, String>,
    pub streams: Vec<ProbedStream>,
}

/// Per-stream facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbedStream {
    /// `video`, `audio`, `data`, ...
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u32>,
    pub tags: BTreeMap<String, String>,
}

impl ProbedStream {
    pub fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type.as_deref() == Some("audio")
    }
}

impl ProbedInput {
    /// Build from `ffprobe -show_format -show_streams -of json` output.
    pub fn from_ffprobe_json(path: &Path, json: &Value) -> StitchResult<Self> {
        let format = json
            .get("format")
            .ok_or_else(|| StitchError::probe(path, "missing 'format' section"))?;

        let duration_secs = match format.get("duration") {
            Some(Value::String(s)) => s
                .parse::<f64>()
                .map_err(|_| StitchError::probe(path, format!("invalid duration '{s}'")))?,
            Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
            _ => return Err(StitchError::probe(path, "missing container duration")),
        };
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(StitchError::probe(
                path,
                format!("invalid duration {duration_secs}"),
            ));
        }

        let streams = json
            .get("streams")
            .and_then(Value::as_array)
            .map(|streams| streams.iter().map(parse_stream).collect())
            .unwrap_or_default();

        Ok(Self {
            duration_secs,
            format_tags: parse_tags(format.get("tags")),
            streams,
        })
    }

    pub fn has_video(&self) -> bool {
        self.streams.iter().any(ProbedStream::is_video)
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(ProbedStream::is_audio)
    }

    /// Dimensions of the first video stream.
    pub fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.streams
            .iter()
            .filter(|s| s.is_video())
            .find_map(|s| Some((s.width?, s.height?)))
    }
}

fn parse_stream(value: &Value) -> ProbedStream {
    let as_u32 = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    };
    ProbedStream {
        codec_type: value
            .get("codec_type")
            .and_then(Value::as_str)
            .map(str::to_string),
        width: as_u32("width"),
        height: as_u32("height"),
        channels: as_u32("channels"),
        tags: parse_tags(value.get("tags")),
    }
}

fn parse_tags(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.clone(), text))
        })
        .collect()
}

/// Reads container metadata for an input file.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> StitchResult<ProbedInput>;
}

/// Maps a spec `filename` to a path the media engine can open.
pub trait InputLocator: Send + Sync {
    fn locate(&self, filename: &str) -> StitchResult<PathBuf>;
}
