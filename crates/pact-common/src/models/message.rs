//! Message model — community chat. Append-only; messages are immutable once
//! sent and there is no client-side edit or delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::wire::{parse_id, parse_ts};

/// A community chat entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub community_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Backend wire form of a message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub community_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}

impl TryFrom<WireMessage> for Message {
    type Error = PactError;

    fn try_from(w: WireMessage) -> Result<Self, PactError> {
        const ENTITY: &str = "message";
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            community_id: parse_id(ENTITY, "community_id", &w.community_id)?,
            author_id: parse_id(ENTITY, "author_id", &w.author_id)?,
            content: w.content,
            created_at: parse_ts(ENTITY, "created_at", &w.created_at)?,
        })
    }
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.to_string(),
            community_id: m.community_id.to_string(),
            author_id: m.author_id.to_string(),
            content: m.content.clone(),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Payload to post a chat message.
#[derive(Debug, Clone, Validate)]
pub struct SendMessageRequest {
    pub community_id: Uuid,
    pub author_id: Uuid,

    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

impl FormRequest for SendMessageRequest {}

impl SendMessageRequest {
    pub fn to_wire(&self) -> Value {
        json!({
            "community_id": self.community_id.to_string(),
            "author_id": self.author_id.to_string(),
            "content": self.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::validate_form;

    #[test]
    fn test_empty_message_rejected() {
        let req = SendMessageRequest {
            community_id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            content: String::new(),
        };
        let errors = validate_form(&req, Utc::now()).unwrap_err();
        assert!(errors.contains_key("content"));
    }
}
