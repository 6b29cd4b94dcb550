//! Half-open time periods with microsecond precision.
//!
//! All absolute times are microseconds since the Unix epoch. Periods are
//! `[start, end)`: two periods that merely touch at an endpoint do not
//! overlap.

use std::fmt;

use serde::{Deserialize, Serialize};

use stitcher_common::error::{StitchError, StitchResult};

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// An absolute instant, in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Seconds since epoch, fractional.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_SEC as f64
    }

    /// Shift by a signed number of microseconds.
    ///
    /// Fails when the result falls outside the representable range.
    pub fn offset_micros(self, delta: i64) -> StitchResult<Self> {
        self.0.checked_add(delta).map(Self).ok_or_else(|| {
            StitchError::schema(format!("timestamp {}us offset by {delta}us overflows", self.0))
        })
    }

    /// Shift by a signed number of seconds, rounded to the nearest microsecond.
    pub fn offset_secs(self, secs: f64) -> StitchResult<Self> {
        self.offset_micros(secs_to_micros(secs)?)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_micros(self.0) {
            Some(dt) => write!(
                f,
                "{}",
                dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
            ),
            None => write!(f, "{}us", self.0),
        }
    }
}

/// Convert fractional seconds to whole microseconds.
///
/// Non-finite values and values outside the `i64` microsecond range are
/// rejected rather than clamped.
pub fn secs_to_micros(secs: f64) -> StitchResult<i64> {
    let micros = (secs * MICROS_PER_SEC as f64).round();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if !micros.is_finite() || micros < i64::MIN as f64 || micros >= i64::MAX as f64 {
        return Err(StitchError::schema(format!(
            "{secs} seconds is out of range for microsecond timestamps"
        )));
    }
    Ok(micros as i64)
}

/// Format a microsecond duration as seconds with exactly six decimals.
///
/// Exact for every representable value, unlike going through `f64`.
pub fn format_secs(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    format!(
        "{sign}{}.{:06}",
        abs / MICROS_PER_SEC as u64,
        abs % MICROS_PER_SEC as u64
    )
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: Timestamp,
    end: Timestamp,
}

impl Period {
    /// Create a period, rejecting `end < start`.
    pub fn new(start: Timestamp, end: Timestamp) -> StitchResult<Self> {
        if end < start {
            return Err(StitchError::schema(format!(
                "period end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A period starting at `start` and lasting `micros` microseconds.
    pub fn starting_at(start: Timestamp, micros: i64) -> StitchResult<Self> {
        Self::new(start, start.offset_micros(micros)?)
    }

    /// A period expressed as second offsets from `origin`.
    pub fn from_offsets(origin: Timestamp, start_secs: f64, end_secs: f64) -> StitchResult<Self> {
        Self::new(origin.offset_secs(start_secs)?, origin.offset_secs(end_secs)?)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn duration_micros(&self) -> i64 {
        self.end.as_micros() - self.start.as_micros()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_micros() as f64 / MICROS_PER_SEC as f64
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The overlapping sub-period, or `None` when the periods do not overlap.
    ///
    /// A zero-length intersection counts as no overlap.
    pub fn intersect(&self, other: &Period) -> Option<Period> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start >= end {
            return None;
        }
        Some(Period { start, end })
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.intersect(other).is_some()
    }

    /// Whether `other` lies entirely inside this period.
    pub fn contains(&self, other: &Period) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn period(start: i64, end: i64) -> Period {
        Period::new(Timestamp::from_micros(start), Timestamp::from_micros(end)).unwrap()
    }

    #[test]
    fn test_rejects_inverted_period() {
        assert!(Period::new(Timestamp::from_micros(10), Timestamp::from_micros(5)).is_err());
        assert!(Period::new(Timestamp::from_micros(5), Timestamp::from_micros(5)).is_ok());
    }

    #[test]
    fn test_intersect_partial_overlap() {
        let a = period(0, 10);
        let b = period(5, 20);
        assert_eq!(a.intersect(&b), Some(period(5, 10)));
    }

    #[test]
    fn test_touching_periods_do_not_overlap() {
        let a = period(0, 10);
        let b = period(10, 20);
        assert_eq!(a.intersect(&b), None);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_contained_period_intersects_to_itself() {
        let outer = period(0, 100);
        let inner = period(20, 30);
        assert_eq!(outer.intersect(&inner), Some(inner));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_from_offsets() {
        let origin = Timestamp::from_micros(1_000_000_000);
        let p = Period::from_offsets(origin, 2.5, 5.0).unwrap();
        assert_eq!(p.start().as_micros(), 1_002_500_000);
        assert_eq!(p.duration_micros(), 2_500_000);
    }

    #[test]
    fn test_offset_overflow_is_an_error() {
        let near_max = Timestamp::from_micros(i64::MAX - 1);
        assert!(near_max.offset_micros(1).is_ok());
        assert!(matches!(
            near_max.offset_micros(10),
            Err(StitchError::Schema { .. })
        ));
        assert!(Period::starting_at(near_max, 10_000_000).is_err());
        assert!(Timestamp::from_micros(i64::MIN).offset_micros(-1).is_err());
    }

    #[test]
    fn test_secs_to_micros_rejects_out_of_range() {
        assert_eq!(secs_to_micros(1.5).unwrap(), 1_500_000);
        assert_eq!(secs_to_micros(-0.25).unwrap(), -250_000);
        assert!(secs_to_micros(1e13).is_err());
        assert!(secs_to_micros(-1e13).is_err());
        assert!(secs_to_micros(f64::NAN).is_err());
        assert!(secs_to_micros(f64::INFINITY).is_err());
    }

    #[test]
    fn test_format_secs_is_exact() {
        assert_eq!(format_secs(0), "0.000000");
        assert_eq!(format_secs(3_000_000), "3.000000");
        assert_eq!(format_secs(1_234_567), "1.234567");
        assert_eq!(format_secs(-500_000), "-0.500000");
    }

    #[test]
    fn test_timestamp_display_is_rfc3339() {
        let ts = Timestamp::from_micros(1_589_462_400_000_000);
        assert_eq!(ts.to_string(), "2020-05-14T13:20:00.000000Z");
    }

    proptest! {
        #[test]
        fn prop_intersect_is_commutative(
            a in -1_000_000i64..1_000_000, la in 0i64..1_000_000,
            b in -1_000_000i64..1_000_000, lb in 0i64..1_000_000,
        ) {
            let p1 = period(a, a + la);
            let p2 = period(b, b + lb);
            prop_assert_eq!(p1.intersect(&p2), p2.intersect(&p1));
        }

        #[test]
        fn prop_intersection_is_contained_in_both(
            a in -1_000_000i64..1_000_000, la in 0i64..1_000_000,
            b in -1_000_000i64..1_000_000, lb in 0i64..1_000_000,
        ) {
            let p1 = period(a, a + la);
            let p2 = period(b, b + lb);
            if let Some(i) = p1.intersect(&p2) {
                prop_assert!(p1.contains(&i));
                prop_assert!(p2.contains(&i));
                prop_assert!(i.duration_micros() > 0);
            }
        }
    }
}
