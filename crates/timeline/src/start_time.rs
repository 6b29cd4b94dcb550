//! Start-time resolution for inputs.
//!
//! Recorders stamp the wall-clock start of a file in several places. The
//! policy below tries each source in a fixed order and stops at the first
//! one that yields a value.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::period::Timestamp;
use crate::probe::ProbedInput;
use crate::spec::InputRef;

/// Minimum digit count for a filename timestamp (microseconds since 2001).
const MIN_FILENAME_DIGITS: usize = 13;

/// Where an input's start time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTimeSource {
    /// The spec's `start` field.
    Explicit,
    /// A `comment` tag on one of the streams.
    StreamComment,
    /// A `comment` tag on the container.
    ContainerComment,
    /// Digits embedded in the file name.
    Filename,
}

impl fmt::Display for StartTimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explicit => "explicit",
            Self::StreamComment => "stream comment",
            Self::ContainerComment => "container comment",
            Self::Filename => "filename",
        };
        f.write_str(s)
    }
}

/// Ordered fallback chain of start-time sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTimePolicy {
    pub order: Vec<StartTimeSource>,
}

impl Default for StartTimePolicy {
    fn default() -> Self {
        Self {
            order: vec![
                StartTimeSource::Explicit,
                StartTimeSource::StreamComment,
                StartTimeSource::ContainerComment,
                StartTimeSource::Filename,
            ],
        }
    }
}

impl StartTimePolicy {
    /// First start time any source in `order` yields.
    pub fn resolve(
        &self,
        input: &InputRef,
        probe: &ProbedInput,
    ) -> Option<(Timestamp, StartTimeSource)> {
        self.order.iter().find_map(|&source| {
            let micros = match source {
                StartTimeSource::Explicit => input.start,
                StartTimeSource::StreamComment => probe.streams.iter().find_map(|s| comment_micros(&s.tags)),
                StartTimeSource::ContainerComment => comment_micros(&probe.format_tags),
                StartTimeSource::Filename => filename_micros(&input.filename),
            }?;
            Some((Timestamp::from_micros(micros), source))
        })
    }
}

/// Read `u` from a JSON object stored in a `comment` tag (any key case).
fn comment_micros(tags: &BTreeMap<String, String>) -> Option<i64> {
    let raw = tags
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("comment"))
        .map(|(_, v)| v)?;
    let value: Value = serde_json::from_str(raw).ok()?;
    match value.get("u")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Trailing `-` or `_` separated digit run in the file stem.
pub fn filename_micros(filename: &str) -> Option<i64> {
    let stem = Path::new(filename).file_stem()?.to_str()?;
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let digits = &stem[digits_start..];
    let separator = stem[..digits_start].chars().next_back()?;
    if !matches!(separator, '-' | '_') || digits.len() < MIN_FILENAME_DIGITS {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbedStream;

    fn input(filename: &str, start: Option<i64>) -> InputRef {
        InputRef {
            stream_name: "cam".to_string(),
            filename: filename.to_string(),
            start,
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn probe_with(stream_tags: &[(&str, &str)], format_tags: &[(&str, &str)]) -> ProbedInput {
        ProbedInput {
            duration_secs: 10.0,
            format_tags: tags(format_tags),
            streams: vec![
                ProbedStream {
                    codec_type: Some("audio".into()),
                    ..Default::default()
                },
                ProbedStream {
                    codec_type: Some("video".into()),
                    tags: tags(stream_tags),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_explicit_start_wins() {
        let probe = probe_with(&[("comment", r#"{"u": 2}"#)], &[("COMMENT", r#"{"u": 3}"#)]);
        let got = StartTimePolicy::default().resolve(&input("a.webm", Some(1)), &probe);
        assert_eq!(got, Some((Timestamp::from_micros(1), StartTimeSource::Explicit)));
    }

    #[test]
    fn test_stream_comment_before_container_comment() {
        let probe = probe_with(&[("COMMENT", r#"{"u": "2"}"#)], &[("COMMENT", r#"{"u": 3}"#)]);
        let got = StartTimePolicy::default().resolve(&input("a.webm", None), &probe);
        assert_eq!(
            got,
            Some((Timestamp::from_micros(2), StartTimeSource::StreamComment))
        );
    }

    #[test]
    fn test_container_comment_fallback() {
        let probe = probe_with(&[("title", "x")], &[("comment", r#"{"u": 3, "s": 0}"#)]);
        let got = StartTimePolicy::default().resolve(&input("a.webm", None), &probe);
        assert_eq!(
            got,
            Some((Timestamp::from_micros(3), StartTimeSource::ContainerComment))
        );
    }

    #[test]
    fn test_unparseable_comment_falls_through() {
        let probe = probe_with(&[("comment", "recorded by cam")], &[]);
        let got = StartTimePolicy::default()
            .resolve(&input("cam1-1589462400000000.webm", None), &probe);
        assert_eq!(
            got,
            Some((
                Timestamp::from_micros(1_589_462_400_000_000),
                StartTimeSource::Filename
            ))
        );
    }

    #[test]
    fn test_no_source_yields_none() {
        let probe = probe_with(&[], &[]);
        assert_eq!(
            StartTimePolicy::default().resolve(&input("cam1.webm", None), &probe),
            None
        );
    }

    #[test]
    fn test_custom_order() {
        let policy = StartTimePolicy {
            order: vec![StartTimeSource::ContainerComment, StartTimeSource::Explicit],
        };
        let probe = probe_with(&[], &[("COMMENT", r#"{"u": 3}"#)]);
        let got = policy.resolve(&input("a.webm", Some(1)), &probe);
        assert_eq!(got.map(|(_, s)| s), Some(StartTimeSource::ContainerComment));
    }

    #[test]
    fn test_filename_micros() {
        assert_eq!(
            filename_micros("/data/cam_1589462400000000.mkv"),
            Some(1_589_462_400_000_000)
        );
        assert_eq!(filename_micros("cam-2.webm"), None);
        assert_eq!(filename_micros("1589462400000000.webm"), None);
        assert_eq!(filename_micros("camx1589462400000000.webm"), None);
    }
}
