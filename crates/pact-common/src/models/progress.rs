//! Progress log model — the immutable audit trail of progress updates.
//!
//! Appending a new entry is the only mutation. Entries are never updated or
//! deleted; a member's current progress is whatever the latest entry says.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::wire::{malformed, parse_id, parse_ts};

/// One recorded progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLog {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Fractional progress at the time of the update, in [0, 1].
    pub value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Backend wire form of a progress log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireProgressLog {
    pub id: String,
    pub member_id: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

impl TryFrom<WireProgressLog> for ProgressLog {
    type Error = PactError;

    fn try_from(w: WireProgressLog) -> Result<Self, PactError> {
        const ENTITY: &str = "progress_log";
        if !(0.0..=1.0).contains(&w.value) {
            return Err(malformed(ENTITY, "value", "must be within [0, 1]"));
        }
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            member_id: parse_id(ENTITY, "member_id", &w.member_id)?,
            value: w.value,
            notes: w.notes,
            created_at: parse_ts(ENTITY, "created_at", &w.created_at)?,
        })
    }
}

impl From<&ProgressLog> for WireProgressLog {
    fn from(p: &ProgressLog) -> Self {
        Self {
            id: p.id.to_string(),
            member_id: p.member_id.to_string(),
            value: p.value,
            notes: p.notes.clone(),
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Payload to record a progress update. Appends one log entry; the server
/// moves the member's current progress to match.
#[derive(Debug, Clone, Validate)]
pub struct UpdateProgressRequest {
    pub member_id: Uuid,
    /// Needed so the membership list for the community can be invalidated.
    pub community_id: Uuid,

    #[validate(range(min = 0.0, max = 1.0, message = "Progress must be between 0 and 1"))]
    pub value: f64,

    #[validate(length(max = 500, message = "Notes are limited to 500 characters"))]
    pub notes: Option<String>,
}

impl FormRequest for UpdateProgressRequest {}

impl UpdateProgressRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("member_id".into(), json!(self.member_id.to_string()));
        fields.insert("value".into(), json!(self.value));
        if let Some(notes) = &self.notes {
            fields.insert("notes".into(), json!(notes));
        }
        Value::Object(fields)
    }
}
