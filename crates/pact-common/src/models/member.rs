//! Community member model — a user's membership in one community.
//!
//! Owned by its community; removed when the membership ends. Progress is a
//! fraction in [0, 1]; the audit trail of progress changes lives in
//! [`crate::models::progress::ProgressLog`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::models::community::CommunityStatus;
use crate::wire::{malformed, parse_id, parse_ts};

/// A user's membership in a community.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMember {
    pub id: Uuid,
    pub community_id: Uuid,
    pub user_id: Uuid,
    pub has_staked: bool,
    /// Fractional progress toward the goal, in [0, 1].
    pub progress: f64,
    /// Mirrors the community lifecycle.
    pub status: CommunityStatus,
    /// Stake the member proposed when joining, if any.
    pub proposed_stake: Option<f64>,
    pub accepted_terms: bool,
    pub joined_at: DateTime<Utc>,
}

/// Backend wire form of a membership record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCommunityMember {
    pub id: String,
    pub community_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_staked: Option<bool>,
    pub progress: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_stake: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_terms: Option<bool>,
    pub joined_at: String,
}

impl TryFrom<WireCommunityMember> for CommunityMember {
    type Error = PactError;

    fn try_from(w: WireCommunityMember) -> Result<Self, PactError> {
        const ENTITY: &str = "community_member";
        if !(0.0..=1.0).contains(&w.progress) {
            return Err(malformed(ENTITY, "progress", "must be within [0, 1]"));
        }
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            community_id: parse_id(ENTITY, "community_id", &w.community_id)?,
            user_id: parse_id(ENTITY, "user_id", &w.user_id)?,
            has_staked: w.has_staked.unwrap_or(false),
            progress: w.progress,
            status: CommunityStatus::parse(ENTITY, &w.status)?,
            proposed_stake: w.proposed_stake,
            accepted_terms: w.accepted_terms.unwrap_or(false),
            joined_at: parse_ts(ENTITY, "joined_at", &w.joined_at)?,
        })
    }
}

impl From<&CommunityMember> for WireCommunityMember {
    fn from(m: &CommunityMember) -> Self {
        Self {
            id: m.id.to_string(),
            community_id: m.community_id.to_string(),
            user_id: m.user_id.to_string(),
            has_staked: Some(m.has_staked),
            progress: m.progress,
            status: m.status.as_str().into(),
            proposed_stake: m.proposed_stake,
            accepted_terms: Some(m.accepted_terms),
            joined_at: m.joined_at.to_rfc3339(),
        }
    }
}

/// Payload to join a community.
#[derive(Debug, Clone, Validate)]
pub struct JoinCommunityRequest {
    pub community_id: Uuid,
    pub user_id: Uuid,

    #[validate(range(min = 1.0, message = "Proposed stake must be at least 1"))]
    pub proposed_stake: Option<f64>,

    pub accepted_terms: bool,
}

impl FormRequest for JoinCommunityRequest {
    fn cross_field(&self, _now: DateTime<Utc>) -> Result<(), (String, String)> {
        if !self.accepted_terms {
            return Err((
                "accepted_terms".into(),
                "You must accept the community terms to join".into(),
            ));
        }
        Ok(())
    }
}

impl JoinCommunityRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("community_id".into(), json!(self.community_id.to_string()));
        fields.insert("user_id".into(), json!(self.user_id.to_string()));
        if let Some(stake) = self.proposed_stake {
            fields.insert("proposed_stake".into(), json!(stake));
        }
        fields.insert("accepted_terms".into(), json!(self.accepted_terms));
        Value::Object(fields)
    }
}
