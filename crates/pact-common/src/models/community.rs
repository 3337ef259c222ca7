//! Community model — the goal-accountability group.
//!
//! A community gathers members around a shared goal with money at stake.
//! Its lifecycle is monotonic: `pending → active → {completed, failed}`,
//! never backwards. The server owns the transitions; the client only
//! refuses to request an impossible one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::wire::{malformed, parse_id, parse_ts};

/// Who can discover and join a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub(crate) fn parse(entity: &'static str, raw: &str) -> Result<Self, PactError> {
        match raw {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(malformed(entity, "visibility", format!("unknown value `{other}`"))),
        }
    }
}

/// Community lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl CommunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn parse(entity: &'static str, raw: &str) -> Result<Self, PactError> {
        match raw {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(malformed(entity, "status", format!("unknown value `{other}`"))),
        }
    }

    /// Whether `next` is a legal forward transition. Transitions are
    /// monotonic and terminal states admit none.
    pub fn can_transition_to(&self, next: CommunityStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Failed)
        )
    }
}

/// A Pact community.
#[derive(Debug, Clone, PartialEq)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// The shared goal, in the members' words.
    pub goal: String,
    /// Optional numeric target (e.g. "12" books).
    pub goal_amount: Option<f64>,
    pub category: String,
    pub tags: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub visibility: Visibility,
    pub status: CommunityStatus,
    /// Stake each member commits, at risk against goal completion.
    pub staking_amount: f64,
    pub creator_id: Uuid,
    /// Denormalized by the server.
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Backend wire form of a community record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCommunity {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub start_date: String,
    pub deadline: String,
    pub visibility: String,
    pub status: String,
    pub staking_amount: f64,
    pub creator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
    pub created_at: String,
}

impl TryFrom<WireCommunity> for Community {
    type Error = PactError;

    fn try_from(w: WireCommunity) -> Result<Self, PactError> {
        const ENTITY: &str = "community";
        let start_date = parse_ts(ENTITY, "start_date", &w.start_date)?;
        let deadline = parse_ts(ENTITY, "deadline", &w.deadline)?;
        if deadline <= start_date {
            return Err(malformed(ENTITY, "deadline", "must be after start_date"));
        }
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            name: w.name,
            description: w.description.unwrap_or_default(),
            goal: w.goal,
            goal_amount: w.goal_amount,
            category: w.category.unwrap_or_default(),
            tags: w.tags.unwrap_or_default(),
            start_date,
            deadline,
            visibility: Visibility::parse(ENTITY, &w.visibility)?,
            status: CommunityStatus::parse(ENTITY, &w.status)?,
            staking_amount: w.staking_amount,
            creator_id: parse_id(ENTITY, "creator_id", &w.creator_id)?,
            member_count: w.member_count.unwrap_or(0),
            created_at: parse_ts(ENTITY, "created_at", &w.created_at)?,
        })
    }
}

impl From<&Community> for WireCommunity {
    fn from(c: &Community) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            description: Some(c.description.clone()),
            goal: c.goal.clone(),
            goal_amount: c.goal_amount,
            category: Some(c.category.clone()),
            tags: Some(c.tags.clone()),
            start_date: c.start_date.to_rfc3339(),
            deadline: c.deadline.to_rfc3339(),
            visibility: c.visibility.as_str().into(),
            status: c.status.as_str().into(),
            staking_amount: c.staking_amount,
            creator_id: c.creator_id.to_string(),
            member_count: Some(c.member_count),
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// Community creation payload.
#[derive(Debug, Clone, Validate)]
pub struct CreateCommunityRequest {
    #[validate(length(min = 2, max = 100, message = "Community name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description is limited to 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Describe the shared goal"))]
    pub goal: String,

    #[validate(range(min = 0.0, message = "Goal target cannot be negative"))]
    pub goal_amount: Option<f64>,

    #[validate(length(min = 1, max = 50, message = "Pick a category"))]
    pub category: String,

    pub tags: Vec<String>,

    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub visibility: Visibility,

    #[validate(range(min = 1.0, message = "Staking amount must be at least 1"))]
    pub staking_amount: f64,
}

impl FormRequest for CreateCommunityRequest {
    fn cross_field(&self, now: DateTime<Utc>) -> Result<(), (String, String)> {
        if self.start_date < now + Duration::hours(24) {
            return Err((
                "start_date".into(),
                "Start date must be at least 24 hours from now".into(),
            ));
        }
        if self.deadline <= self.start_date {
            return Err(("deadline".into(), "Deadline must be after the start date".into()));
        }
        Ok(())
    }
}

impl CreateCommunityRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(self.name));
        if let Some(description) = &self.description {
            fields.insert("description".into(), json!(description));
        }
        fields.insert("goal".into(), json!(self.goal));
        if let Some(goal_amount) = self.goal_amount {
            fields.insert("goal_amount".into(), json!(goal_amount));
        }
        fields.insert("category".into(), json!(self.category));
        fields.insert("tags".into(), json!(self.tags));
        fields.insert("start_date".into(), json!(self.start_date.to_rfc3339()));
        fields.insert("deadline".into(), json!(self.deadline.to_rfc3339()));
        fields.insert("visibility".into(), json!(self.visibility.as_str()));
        fields.insert("staking_amount".into(), json!(self.staking_amount));
        Value::Object(fields)
    }
}

/// Community update payload. Only set fields are serialized.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateCommunityRequest {
    #[validate(length(min = 2, max = 100, message = "Community name must be 2-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description is limited to 1000 characters"))]
    pub description: Option<String>,

    pub tags: Option<Vec<String>>,

    /// Requested lifecycle transition. The server rejects any move that is
    /// not monotonic.
    pub status: Option<CommunityStatus>,
}

impl FormRequest for UpdateCommunityRequest {}

impl UpdateCommunityRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), json!(name));
        }
        if let Some(description) = &self.description {
            fields.insert("description".into(), json!(description));
        }
        if let Some(tags) = &self.tags {
            fields.insert("tags".into(), json!(tags));
        }
        if let Some(status) = self.status {
            fields.insert("status".into(), json!(status.as_str()));
        }
        Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::validate_form;

    fn wire_fixture() -> WireCommunity {
        WireCommunity {
            id: "0192c7a1-9a2b-7c3d-8e4f-5a6b7c8d9e0f".into(),
            name: "Readers".into(),
            description: Some("A book club with teeth".into()),
            goal: "Read 12 books".into(),
            goal_amount: Some(12.0),
            category: Some("learning".into()),
            tags: Some(vec!["books".into(), "habits".into()]),
            start_date: "2026-09-10T12:00:00+00:00".into(),
            deadline: "2026-12-10T12:00:00+00:00".into(),
            visibility: "public".into(),
            status: "pending".into(),
            staking_amount: 50.0,
            creator_id: "0192c7a1-0000-7c3d-8e4f-5a6b7c8d9e0f".into(),
            member_count: Some(3),
            created_at: "2026-09-01T08:30:00+00:00".into(),
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let wire = wire_fixture();
        let domain = Community::try_from(wire.clone()).unwrap();
        let back = WireCommunity::from(&domain);
        assert_eq!(back.id, wire.id);
        assert_eq!(back.name, wire.name);
        assert_eq!(back.description, wire.description);
        assert_eq!(back.goal, wire.goal);
        assert_eq!(back.goal_amount, wire.goal_amount);
        assert_eq!(back.category, wire.category);
        assert_eq!(back.tags, wire.tags);
        assert_eq!(back.start_date, wire.start_date);
        assert_eq!(back.deadline, wire.deadline);
        assert_eq!(back.visibility, wire.visibility);
        assert_eq!(back.status, wire.status);
        assert_eq!(back.staking_amount, wire.staking_amount);
        assert_eq!(back.creator_id, wire.creator_id);
        assert_eq!(back.member_count, wire.member_count);
        assert_eq!(back.created_at, wire.created_at);
    }

    #[test]
    fn test_missing_optionals_get_defaults() {
        let mut wire = wire_fixture();
        wire.tags = None;
        wire.description = None;
        wire.member_count = None;
        let domain = Community::try_from(wire).unwrap();
        assert!(domain.tags.is_empty());
        assert!(domain.description.is_empty());
        assert_eq!(domain.member_count, 0);
    }

    #[test]
    fn test_bad_date_is_malformed() {
        let mut wire = wire_fixture();
        wire.start_date = "next tuesday".into();
        let err = Community::try_from(wire).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RECORD");
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let mut wire = wire_fixture();
        wire.status = "paused".into();
        let err = Community::try_from(wire).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RECORD");
    }

    #[test]
    fn test_deadline_before_start_is_malformed() {
        let mut wire = wire_fixture();
        wire.deadline = "2026-09-01T12:00:00+00:00".into();
        let err = Community::try_from(wire).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RECORD");
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use CommunityStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Failed));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Active));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_create_request_start_date_window() {
        let now = Utc::now();
        let req = CreateCommunityRequest {
            name: "Readers".into(),
            description: None,
            goal: "Read 12 books".into(),
            goal_amount: None,
            category: "learning".into(),
            tags: vec![],
            start_date: now + Duration::hours(1),
            deadline: now + Duration::days(30),
            visibility: Visibility::Public,
            staking_amount: 50.0,
        };
        let errors = validate_form(&req, now).unwrap_err();
        assert!(errors.get("start_date").unwrap().contains("24 hours"));
    }

    #[test]
    fn test_create_request_valid() {
        let now = Utc::now();
        let req = CreateCommunityRequest {
            name: "Readers".into(),
            description: None,
            goal: "Read 12 books".into(),
            goal_amount: Some(12.0),
            category: "learning".into(),
            tags: vec!["books".into()],
            start_date: now + Duration::hours(48),
            deadline: now + Duration::days(30),
            visibility: Visibility::Public,
            staking_amount: 50.0,
        };
        assert!(validate_form(&req, now).is_ok());
        let wire = req.to_wire();
        assert_eq!(wire["visibility"], "public");
        assert!(wire.get("description").is_none());
    }
}
