// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules over the single-writer connection.

pub mod channels;
pub mod jobs;
pub mod posts;
pub mod templates;

use chrono::{DateTime, Utc};

/// Serialize a timestamp in the one fixed storage format.
///
/// Millisecond precision, always three fractional digits, `Z` suffix -- so
/// that SQL string comparison between any two stored timestamps (and any
/// parameter produced here) orders them chronologically.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a stored timestamp back into `DateTime<Utc>`.
pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a nullable stored timestamp.
pub(crate) fn parse_opt_ts(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.as_deref().map(parse_ts).transpose()
}
