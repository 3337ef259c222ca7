//! User model and profile/auth request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::wire::{parse_id, parse_ts};

/// A Pact user. Immutable except via profile update.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    /// Avatar image key
    pub avatar: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Backend wire form of a user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireUser {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub joined_at: String,
}

impl TryFrom<WireUser> for User {
    type Error = PactError;

    fn try_from(w: WireUser) -> Result<Self, PactError> {
        Ok(Self {
            id: parse_id("user", "id", &w.id)?,
            display_name: w.display_name,
            email: w.email,
            avatar: w.avatar,
            joined_at: parse_ts("user", "joined_at", &w.joined_at)?,
        })
    }
}

impl From<&User> for WireUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            display_name: u.display_name.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
            joined_at: u.joined_at.to_rfc3339(),
        }
    }
}

/// Account registration payload.
#[derive(Debug, Clone, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: String,
}

impl FormRequest for RegisterRequest {}

impl RegisterRequest {
    /// Profile fields sent alongside the credentials.
    pub fn profile_fields(&self) -> Value {
        json!({ "display_name": self.display_name })
    }
}

/// Profile update payload. Only the fields the caller set are serialized, so
/// untouched server-side values are never clobbered.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: Option<String>,

    pub avatar: Option<String>,
}

impl FormRequest for UpdateProfileRequest {}

impl UpdateProfileRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        if let Some(name) = &self.display_name {
            fields.insert("display_name".into(), json!(name));
        }
        if let Some(avatar) = &self.avatar {
            fields.insert("avatar".into(), json!(avatar));
        }
        Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::validate_form;

    #[test]
    fn test_register_rejects_bad_email() {
        let req = RegisterRequest {
            email: "not-an-email".into(),
            password: "long enough pw".into(),
            display_name: "Avery".into(),
        };
        let errors = validate_form(&req, Utc::now()).unwrap_err();
        assert_eq!(errors.get("email").unwrap(), "Enter a valid email address");
    }

    #[test]
    fn test_profile_patch_omits_unset_fields() {
        let req = UpdateProfileRequest {
            display_name: Some("Avery".into()),
            avatar: None,
        };
        let wire = req.to_wire();
        assert_eq!(wire, json!({ "display_name": "Avery" }));
        assert!(wire.get("avatar").is_none());
    }
}
