//! Database query modules.
//!
//! - libraries: Library management
//! - episodes: Playable media items and their probe information

pub mod episodes;
pub mod libraries;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

/// Parse a UUID stored as TEXT, surfacing bad rows as conversion errors.
pub(crate) fn uuid_column(value: String, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an RFC 3339 timestamp stored as TEXT.
pub(crate) fn timestamp_column(value: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a JSON document stored as TEXT.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    value: String,
    idx: usize,
) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
