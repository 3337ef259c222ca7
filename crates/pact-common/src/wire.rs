//! Wire ↔ domain mapping helpers.
//!
//! The backend speaks snake_case records with ISO-8601 string dates and
//! string ids. Each model defines a `Wire*` struct mirroring that schema and
//! a fallible `TryFrom<Wire*>` into the typed domain entity. The helpers
//! here centralize the primitive conversions and the
//! [`PactError::MalformedRecord`] failures — a decode failure is a defect,
//! not a user error, so it carries enough detail to debug.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{PactError, PactResult};

/// Build a [`PactError::MalformedRecord`] for a named field.
pub(crate) fn malformed(entity: &'static str, field: &str, detail: impl AsRef<str>) -> PactError {
    PactError::MalformedRecord {
        entity,
        detail: format!("invalid `{field}`: {}", detail.as_ref()),
    }
}

/// Parse a wire id field into a Uuid.
pub(crate) fn parse_id(entity: &'static str, field: &str, raw: &str) -> PactResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| malformed(entity, field, e.to_string()))
}

/// Parse an ISO-8601 timestamp field.
pub(crate) fn parse_ts(entity: &'static str, field: &str, raw: &str) -> PactResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| malformed(entity, field, e.to_string()))
}

/// Decode one raw record into a domain entity via its wire form.
pub fn decode_entity<W, T>(entity: &'static str, value: Value) -> PactResult<T>
where
    W: DeserializeOwned,
    T: TryFrom<W, Error = PactError>,
{
    let wire: W = serde_json::from_value(value).map_err(|e| PactError::MalformedRecord {
        entity,
        detail: e.to_string(),
    })?;
    T::try_from(wire)
}

/// Decode a raw record list into domain entities, failing on the first
/// malformed record.
pub fn decode_list<W, T>(entity: &'static str, value: Value) -> PactResult<Vec<T>>
where
    W: DeserializeOwned,
    T: TryFrom<W, Error = PactError>,
{
    let rows: Vec<Value> = serde_json::from_value(value).map_err(|e| PactError::MalformedRecord {
        entity,
        detail: e.to_string(),
    })?;
    rows.into_iter()
        .map(|row| decode_entity::<W, T>(entity, row))
        .collect()
}
