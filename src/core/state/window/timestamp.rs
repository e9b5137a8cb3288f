use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::errors::CoreError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A timestamp as it arrives from a collaborator, before normalization to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl RawTimestamp {
    /// Accepts RFC 3339 (aware) or `YYYY-MM-DD HH:MM:SS[.f]` (naive).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let value = value.trim();
        if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self::Aware(aware));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(Self::Naive)
            .ok_or_else(|| CoreError::MalformedInput(format!("unparsable timestamp '{value}'")))
    }

    /// Converts to UTC. Naive values are read in the `reference` offset.
    pub fn normalize(self, reference: &FixedOffset) -> Result<DateTime<Utc>, CoreError> {
        match self {
            Self::Aware(ts) => Ok(ts.with_timezone(&Utc)),
            Self::Naive(naive) => reference
                .from_local_datetime(&naive)
                .single()
                .map(|ts| ts.with_timezone(&Utc))
                .ok_or_else(|| CoreError::NaiveTimestamp(naive.to_string())),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Aware(value.fixed_offset())
    }
}

/// Parses an offset such as `+05:30`, `-0800`, `Z` or `UTC`.
pub fn parse_reference_offset(value: &str) -> Result<FixedOffset, CoreError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    DateTime::parse_from_str(&format!("2000-01-01 00:00:00 {value}"), "%Y-%m-%d %H:%M:%S %z")
        .map(|ts| *ts.offset())
        .map_err(|e| CoreError::InvalidConfig(format!("reference offset '{value}': {e}")))
}
