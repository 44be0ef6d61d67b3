use chrono::{DateTime, Utc};
use std::str::FromStr;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const MICROS_PER_SECOND: i64 = 1_000_000;

/// Unit in which timestamps are written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Seconds,
    Milliseconds,
    Microseconds,
}

impl Precision {
    /// The `precision` query parameter accepted by the `/write` endpoint.
    /// Microseconds are `u` there, not `us`.
    pub fn token(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Milliseconds => "ms",
            Precision::Microseconds => "u",
        }
    }

    /// Number of timestamp units in one second.
    pub fn scale(&self) -> i64 {
        match self {
            Precision::Seconds => 1,
            Precision::Milliseconds => 1_000,
            Precision::Microseconds => 1_000_000,
        }
    }

    fn nanos_per_unit(&self) -> i128 {
        NANOS_PER_SECOND / i128::from(self.scale())
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.token().fmt(f)
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Accepts both the internal abbreviations and the wire tokens
        match value.to_lowercase().as_str() {
            "s" | "seconds" => Ok(Precision::Seconds),
            "ms" | "milliseconds" => Ok(Precision::Milliseconds),
            "us" | "u" | "microseconds" => Ok(Precision::Microseconds),
            other => Err(format!("unsupported precision {other}, expected s, ms or us")),
        }
    }
}

/// Timestamp of an explicit instant, scaled to `precision` and rounded to the
/// nearest unit with ties away from zero.
pub fn scaled_timestamp(instant: &DateTime<Utc>, precision: Precision) -> i64 {
    let nanos = i128::from(instant.timestamp()) * NANOS_PER_SECOND
        + i128::from(instant.timestamp_subsec_nanos());
    let units = div_round_half_away(nanos, precision.nanos_per_unit());
    // chrono's range keeps any instant well inside i64 microseconds
    units as i64
}

/// Scales a wall-clock reading split into whole seconds and sub-second
/// microseconds. Sub-unit remainders are truncated.
pub fn scaled_wall_clock(seconds: i64, micros: u32, precision: Precision) -> i64 {
    let scale = precision.scale();
    seconds * scale + i64::from(micros) * scale / MICROS_PER_SECOND
}

/// Current wall-clock time in `precision` units.
pub fn now_timestamp(precision: Precision) -> i64 {
    let now = Utc::now();
    scaled_wall_clock(now.timestamp(), now.timestamp_subsec_micros(), precision)
}

/// Wire rendering of a point's timestamp: the explicit instant when present,
/// the current wall-clock time otherwise.
pub fn timestamp_string(instant: Option<&DateTime<Utc>>, precision: Precision) -> String {
    match instant {
        Some(instant) => scaled_timestamp(instant, precision).to_string(),
        None => now_timestamp(precision).to_string(),
    }
}

fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    }
}
