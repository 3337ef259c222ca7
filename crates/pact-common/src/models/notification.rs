//! Notification model.
//!
//! The payload is a tagged union keyed by the notification type. Unknown
//! types decode to [`NotificationPayload::Other`] so old clients survive new
//! server-side notification kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PactError;
use crate::models::community::CommunityStatus;
use crate::wire::{parse_id, parse_ts};

/// Typed notification payload, discriminated by the wire `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    MemberJoined {
        community_id: Uuid,
        user_id: Uuid,
    },
    ProgressUpdated {
        community_id: Uuid,
        member_id: Uuid,
        value: f64,
    },
    StakePlaced {
        community_id: Uuid,
        amount: f64,
    },
    CommunityStatusChanged {
        community_id: Uuid,
        status: CommunityStatus,
    },
    WalletCredited {
        amount: f64,
    },
    /// Forward-compatibility catch-all for types this client predates.
    #[serde(other)]
    Other,
}

/// A per-user notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub read: bool,
    pub payload: NotificationPayload,
    pub created_at: DateTime<Utc>,
}

/// Backend wire form of a notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireNotification {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(flatten)]
    pub payload: NotificationPayload,
    pub created_at: String,
}

impl TryFrom<WireNotification> for Notification {
    type Error = PactError;

    fn try_from(w: WireNotification) -> Result<Self, PactError> {
        const ENTITY: &str = "notification";
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            user_id: parse_id(ENTITY, "user_id", &w.user_id)?,
            read: w.read.unwrap_or(false),
            payload: w.payload,
            created_at: parse_ts(ENTITY, "created_at", &w.created_at)?,
        })
    }
}

impl From<&Notification> for WireNotification {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            user_id: n.user_id.to_string(),
            read: Some(n.read),
            payload: n.payload.clone(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}
