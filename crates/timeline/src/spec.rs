//! Spec documents: the JSON contract describing one output video.
//!
//! A spec names an output window (`output_start` + `output_duration`), the
//! output frame size, a milestone schedule deciding which inputs are
//! composited when, and the inputs themselves.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use stitcher_common::error::{StitchError, StitchResult};

use crate::artifact::ArtifactKey;
use crate::period::{secs_to_micros, Period, Timestamp};

/// Framerate used when a spec does not declare one.
pub const DEFAULT_FRAMERATE: u32 = 25;

/// The raw spec document, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDocument {
    /// Output start, microseconds since epoch.
    #[serde(deserialize_with = "deserialize_micros")]
    pub output_start: i64,

    /// Output duration in seconds.
    pub output_duration: f64,

    pub output_size: OutputSize,

    #[serde(default)]
    pub output_framerate: Option<u32>,

    pub milestones: Vec<Milestone>,

    pub inputs: Vec<InputRef>,
}

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

/// A point on the output timeline where the composited video set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Seconds relative to the output start.
    pub timestamp: f64,

    /// Videos to composite, bottom first.
    #[serde(default)]
    pub videos: Vec<VideoPlacement>,
}

/// One video in a milestone's composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPlacement {
    #[serde(rename = "streamname")]
    pub stream_name: String,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,

    #[serde(default)]
    pub x: Option<i32>,

    #[serde(default)]
    pub y: Option<i32>,
}

/// A source file referenced by the spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRef {
    /// Unique key milestones use to reference this input.
    #[serde(rename = "streamname")]
    pub stream_name: String,

    /// Local path or remote reference.
    pub filename: String,

    /// Explicit start, microseconds since epoch.
    #[serde(default, deserialize_with = "deserialize_optional_micros")]
    pub start: Option<i64>,
}

impl VideoPlacement {
    /// Declared size, falling back to the output size.
    pub fn size_or(&self, default: OutputSize) -> OutputSize {
        OutputSize {
            width: self.width.unwrap_or(default.width),
            height: self.height.unwrap_or(default.height),
        }
    }

    /// Overlay position, defaulting to the top-left corner.
    pub fn position(&self) -> (i32, i32) {
        (self.x.unwrap_or(0), self.y.unwrap_or(0))
    }
}

/// A validated spec plus its deterministic artifact key.
#[derive(Debug, Clone)]
pub struct Spec {
    pub document: SpecDocument,
    pub key: ArtifactKey,
    output_period: Period,
}

impl Spec {
    /// Parse and validate raw spec bytes.
    ///
    /// The artifact key is computed here, from the exact bytes given.
    pub fn from_bytes(bytes: &[u8]) -> StitchResult<Self> {
        let document: SpecDocument = serde_json::from_slice(bytes)
            .map_err(|e| StitchError::schema(format!("invalid spec document: {e}")))?;
        validate_document(&document)?;
        let output_period = Period::starting_at(
            Timestamp::from_micros(document.output_start),
            secs_to_micros(document.output_duration)?,
        )?;
        Ok(Self {
            document,
            key: ArtifactKey::from_spec_bytes(bytes),
            output_period,
        })
    }

    pub fn output_start(&self) -> Timestamp {
        Timestamp::from_micros(self.document.output_start)
    }

    pub fn output_duration_micros(&self) -> i64 {
        self.output_period.duration_micros()
    }

    /// `[output_start, output_start + output_duration)`.
    pub fn output_period(&self) -> Period {
        self.output_period
    }

    pub fn output_size(&self) -> OutputSize {
        self.document.output_size
    }

    pub fn framerate(&self) -> u32 {
        self.framerate_or(DEFAULT_FRAMERATE)
    }

    /// Declared framerate, or `default` when the spec has none.
    pub fn framerate_or(&self, default: u32) -> u32 {
        self.document.output_framerate.unwrap_or(default)
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.document.milestones
    }

    pub fn inputs(&self) -> &[InputRef] {
        &self.document.inputs
    }
}

/// Structural and milestone checks run once at load time.
pub fn validate_document(doc: &SpecDocument) -> StitchResult<()> {
    if !doc.output_duration.is_finite() || doc.output_duration <= 0.0 {
        return Err(StitchError::schema(format!(
            "output_duration must be a positive number of seconds, got {}",
            doc.output_duration
        )));
    }
    if doc.output_size.width == 0 || doc.output_size.height == 0 {
        return Err(StitchError::schema(format!(
            "output_size must be positive, got {}x{}",
            doc.output_size.width, doc.output_size.height
        )));
    }
    if doc.output_framerate == Some(0) {
        return Err(StitchError::schema("output_framerate must be positive"));
    }
    if doc.inputs.is_empty() {
        return Err(StitchError::schema("inputs must not be empty"));
    }

    let mut names = HashSet::new();
    for input in &doc.inputs {
        if input.stream_name.is_empty() {
            return Err(StitchError::schema("input streamname must not be empty"));
        }
        if !names.insert(input.stream_name.as_str()) {
            return Err(StitchError::schema(format!(
                "duplicate input streamname '{}'",
                input.stream_name
            )));
        }
    }

    validate_milestones(doc, &names)
}

fn validate_milestones(doc: &SpecDocument, names: &HashSet<&str>) -> StitchResult<()> {
    let Some(first) = doc.milestones.first() else {
        return Err(StitchError::milestone("at least one milestone is required"));
    };
    if first.timestamp != 0.0 {
        return Err(StitchError::milestone(format!(
            "first milestone must be at timestamp 0, got {}",
            first.timestamp
        )));
    }

    let duration = secs_to_micros(doc.output_duration)?;
    let mut previous: Option<i64> = None;
    for (i, milestone) in doc.milestones.iter().enumerate() {
        if !milestone.timestamp.is_finite() {
            return Err(StitchError::milestone(format!(
                "milestone {i} has a non-finite timestamp"
            )));
        }
        let at = secs_to_micros(milestone.timestamp)?;
        if let Some(prev) = previous {
            if at <= prev {
                return Err(StitchError::milestone(format!(
                    "milestone {i} at {}s is not after the previous milestone",
                    milestone.timestamp
                )));
            }
        }
        if at >= duration {
            return Err(StitchError::milestone(format!(
                "milestone {i} at {}s does not start before the output ends ({}s)",
                milestone.timestamp, doc.output_duration
            )));
        }
        for video in &milestone.videos {
            if !names.contains(video.stream_name.as_str()) {
                return Err(StitchError::milestone(format!(
                    "milestone {i} references unknown stream '{}'",
                    video.stream_name
                )));
            }
        }
        previous = Some(at);
    }
    Ok(())
}

/// Microsecond values arrive either as JSON integers or numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum MicrosRepr {
    Int(i64),
    Text(String),
}

impl MicrosRepr {
    fn into_micros<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            MicrosRepr::Int(v) => Ok(v),
            MicrosRepr::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("expected integer microseconds, got '{s}'"))),
        }
    }
}

fn deserialize_micros<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    MicrosRepr::deserialize(deserializer)?.into_micros()
}

fn deserialize_optional_micros<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<MicrosRepr>::deserialize(deserializer)?
        .map(MicrosRepr::into_micros)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MILESTONES: &str = r#"{
        "output_start": 1589462400000000,
        "output_duration": 10,
        "output_size": {"width": 640, "height": 360},
        "milestones": [
            {"timestamp": 0, "videos": [{"streamname": "cam1"}]},
            {"timestamp": 5, "videos": [
                {"streamname": "cam2"},
                {"streamname": "cam1", "width": 160, "height": 90, "x": 470, "y": 260}
            ]}
        ],
        "inputs": [
            {"streamname": "cam1", "filename": "cam1.webm", "start": 1589462400000000},
            {"streamname": "cam2", "filename": "cam2.webm", "start": "1589462395000000"}
        ]
    }"#;

    fn with(edit: impl FnOnce(&mut serde_json::Value)) -> Vec<u8> {
        let mut value: serde_json::Value = serde_json::from_str(TWO_MILESTONES).unwrap();
        edit(&mut value);
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_parse_valid_spec() {
        let spec = Spec::from_bytes(TWO_MILESTONES.as_bytes()).unwrap();
        assert_eq!(spec.framerate(), DEFAULT_FRAMERATE);
        assert_eq!(spec.output_period().duration_micros(), 10_000_000);
        assert_eq!(spec.inputs()[1].start, Some(1_589_462_395_000_000));
        assert_eq!(spec.milestones()[1].videos[1].position(), (470, 260));
        assert_eq!(
            spec.milestones()[1].videos[0].size_or(spec.output_size()),
            OutputSize { width: 640, height: 360 }
        );
    }

    #[test]
    fn test_first_milestone_must_be_zero() {
        let bytes = with(|v| v["milestones"][0]["timestamp"] = 1.into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::MilestoneInvariant { .. })
        ));
    }

    #[test]
    fn test_milestones_must_ascend() {
        let bytes = with(|v| v["milestones"][1]["timestamp"] = 0.into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::MilestoneInvariant { .. })
        ));
    }

    #[test]
    fn test_milestone_past_output_end_rejected() {
        let bytes = with(|v| v["milestones"][1]["timestamp"] = 10.into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::MilestoneInvariant { .. })
        ));
    }

    #[test]
    fn test_unknown_stream_reference_rejected() {
        let bytes = with(|v| v["milestones"][0]["videos"][0]["streamname"] = "nope".into());
        let err = Spec::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_duplicate_stream_names_rejected() {
        let bytes = with(|v| v["inputs"][1]["streamname"] = "cam1".into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::Schema { .. })
        ));
    }

    #[test]
    fn test_missing_required_field_is_schema_error() {
        let bytes = with(|v| {
            v.as_object_mut().unwrap().remove("inputs");
        });
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::Schema { .. })
        ));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let bytes = with(|v| v["inputs"] = serde_json::json!([]));
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::Schema { .. })
        ));
    }

    #[test]
    fn test_output_window_overflow_is_schema_error() {
        let bytes = with(|v| v["output_start"] = (i64::MAX - 1).into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::Schema { .. })
        ));

        let bytes = with(|v| v["output_duration"] = 1e13.into());
        assert!(matches!(
            Spec::from_bytes(&bytes),
            Err(StitchError::Schema { .. })
        ));
    }

    #[test]
    fn test_key_is_over_raw_bytes() {
        let spec = Spec::from_bytes(TWO_MILESTONES.as_bytes()).unwrap();
        assert_eq!(spec.key, ArtifactKey::from_spec_bytes(TWO_MILESTONES.as_bytes()));
    }
}
