//! Sample Types
//!
//! A sample is one `(timestamp, value)` observation. Samples are created
//! once per generation iteration, persisted, broadcast, and then dropped.
//!
//! # Wire Format
//!
//! Streamed samples are a single text line:
//!
//! ```text
//! 2025-01-15T09:30:00.123456Z,42.1337
//! ```
//!
//! The comma is the only delimiter. The timestamp is RFC 3339 in UTC with
//! microsecond precision, the value uses Rust's shortest round-trip decimal
//! representation (never scientific notation, so never a comma).

use std::fmt;
use std::ops::Range;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;

/// Sub-second digits kept on sample timestamps.
///
/// Matches the resolution of PostgreSQL `timestamptz` and of the wire format.
const TIMESTAMP_PRECISION: u16 = 6;

// =============================================================================
// Sample
// =============================================================================

/// One generated observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    timestamp: DateTime<Utc>,
    value: f64,
}

impl Sample {
    /// Create a sample from a timestamp and a finite value.
    ///
    /// The timestamp is truncated to microsecond precision.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::NonFiniteValue` for NaN or infinite values.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Result<Self, SampleError> {
        if !value.is_finite() {
            return Err(SampleError::NonFiniteValue(value));
        }
        Ok(Self {
            timestamp: timestamp.trunc_subsecs(TIMESTAMP_PRECISION),
            value,
        })
    }

    /// Create a sample stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::NonFiniteValue` for NaN or infinite values.
    pub fn now(value: f64) -> Result<Self, SampleError> {
        Self::new(Utc::now(), value)
    }

    /// When the sample was taken.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The observed value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Serialize to the streaming wire format.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Parse a sample from the streaming wire format.
    ///
    /// Splits on the first comma only.
    ///
    /// # Errors
    ///
    /// Returns a `SampleError` when the delimiter is missing or either
    /// field fails to parse.
    pub fn from_wire(line: &str) -> Result<Self, SampleError> {
        let (timestamp, value) = line
            .split_once(',')
            .ok_or(SampleError::MissingDelimiter)?;

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| SampleError::InvalidTimestamp(e.to_string()))?
            .with_timezone(&Utc);

        let value = value
            .parse::<f64>()
            .map_err(|e| SampleError::InvalidValue(e.to_string()))?;

        Self::new(timestamp, value)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.value
        )
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Draws sample values uniformly from a half-open range.
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    range: Range<f64>,
}

impl Default for SampleGenerator {
    fn default() -> Self {
        Self { range: 0.0..100.0 }
    }
}

impl SampleGenerator {
    /// Create a generator over `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::InvalidRange` unless both bounds are finite
    /// and `min < max`.
    pub fn new(min: f64, max: f64) -> Result<Self, SampleError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(SampleError::InvalidRange { min, max });
        }
        Ok(Self { range: min..max })
    }

    /// The configured value range.
    #[must_use]
    pub fn range(&self) -> Range<f64> {
        self.range.clone()
    }

    /// Produce a sample stamped with the current time.
    #[must_use]
    pub fn generate(&self) -> Sample {
        let value = rand::rng().random_range(self.range.clone());
        Sample {
            timestamp: Utc::now().trunc_subsecs(TIMESTAMP_PRECISION),
            value,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors building or parsing samples.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    /// Value is NaN or infinite.
    #[error("sample value must be finite, got {0}")]
    NonFiniteValue(f64),

    /// Wire line has no comma.
    #[error("sample line is missing the ',' delimiter")]
    MissingDelimiter,

    /// Timestamp field is not RFC 3339.
    #[error("invalid sample timestamp: {0}")]
    InvalidTimestamp(String),

    /// Value field is not a float.
    #[error("invalid sample value: {0}")]
    InvalidValue(String),

    /// Generator range is empty or unbounded.
    #[error("invalid value range [{min}, {max})")]
    InvalidRange {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456)
    }

    #[test]
    fn wire_format_matches_expected_layout() {
        let sample = Sample::new(fixed_time(), 42.5).unwrap();
        assert_eq!(sample.to_wire(), "2025-01-15T09:30:00.123456Z,42.5");
    }

    #[test]
    fn whole_values_have_no_exponent_or_comma() {
        let sample = Sample::new(fixed_time(), 1e21).unwrap();
        let line = sample.to_wire();
        let (_, value) = line.split_once(',').unwrap();
        assert!(!value.contains(','));
        assert!(!value.contains('e'));
    }

    #[test]
    fn timestamps_are_truncated_to_micros() {
        let ts = fixed_time() + chrono::Duration::nanoseconds(789);
        let sample = Sample::new(ts, 1.0).unwrap();
        assert_eq!(sample.timestamp(), fixed_time());
    }

    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "positive infinity")]
    #[test_case(f64::NEG_INFINITY ; "negative infinity")]
    fn rejects_non_finite_values(value: f64) {
        assert!(matches!(
            Sample::new(fixed_time(), value),
            Err(SampleError::NonFiniteValue(_))
        ));
    }

    #[test_case("2025-01-15T09:30:00Z" ; "no delimiter")]
    #[test_case("yesterday,1.0" ; "bad timestamp")]
    #[test_case("2025-01-15T09:30:00Z,abc" ; "bad value")]
    #[test_case("2025-01-15T09:30:00Z,inf" ; "infinite value")]
    fn rejects_malformed_lines(line: &str) {
        assert!(Sample::from_wire(line).is_err());
    }

    #[test]
    fn parses_offset_timestamps_into_utc() {
        let sample = Sample::from_wire("2025-01-15T10:30:00.123456+01:00,7").unwrap();
        assert_eq!(sample.timestamp(), fixed_time());
        assert!((sample.value() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_generator_stays_in_reference_range() {
        let generator = SampleGenerator::default();
        for _ in 0..1_000 {
            let value = generator.generate().value();
            assert!((0.0..100.0).contains(&value), "{value} out of range");
        }
    }

    #[test]
    fn custom_generator_range() {
        let generator = SampleGenerator::new(-5.0, -4.0).unwrap();
        for _ in 0..100 {
            let value = generator.generate().value();
            assert!((-5.0..-4.0).contains(&value));
        }
    }

    #[test_case(1.0, 1.0 ; "empty")]
    #[test_case(2.0, 1.0 ; "inverted")]
    #[test_case(f64::NEG_INFINITY, 1.0 ; "unbounded")]
    fn generator_rejects_bad_ranges(min: f64, max: f64) {
        assert!(matches!(
            SampleGenerator::new(min, max),
            Err(SampleError::InvalidRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn wire_format_survives_a_split_on_the_first_comma(
            micros in 0_i64..4_102_444_800_000_000,
            value in proptest::num::f64::NORMAL | proptest::num::f64::ZERO | proptest::num::f64::SUBNORMAL,
        ) {
            let timestamp = DateTime::from_timestamp_micros(micros).unwrap();
            let sample = Sample::new(timestamp, value).unwrap();

            let line = sample.to_wire();
            let (ts, val) = line.split_once(',').unwrap();

            let parsed_ts = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
            let parsed_value: f64 = val.parse().unwrap();

            prop_assert_eq!(parsed_ts, sample.timestamp());
            prop_assert_eq!(parsed_value.to_bits(), sample.value().to_bits());
            prop_assert_eq!(Sample::from_wire(&line).unwrap(), sample);
        }
    }
}
