//! Centralized error types for Pact clients.
//!
//! Uses `thiserror` for ergonomic error definitions. Every failure a caller
//! can observe — local validation, auth, remote conflicts, transport — is a
//! variant here, so view code can branch on one type.

use std::sync::Arc;

use crate::forms::FieldErrors;

/// Core error type used across all Pact client crates.
#[derive(Debug, thiserror::Error)]
pub enum PactError {
    // === Local validation ===
    /// Field-scoped validation failure. Resolved entirely client-side and
    /// never sent over the network.
    #[error("Validation failed on {} field(s)", .fields.len())]
    Validation { fields: FieldErrors },

    // === Auth errors ===
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Unauthorized")]
    Unauthorized,

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The write conflicted with server state (e.g. stake already placed).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The same mutation descriptor is already in flight. A client-side
    /// duplicate-submission guard; the server stays the idempotency authority.
    #[error("Mutation already pending: {mutation}")]
    AlreadyPending { mutation: String },

    // === Decode errors ===
    /// A wire record could not be mapped into a domain entity. Treated as a
    /// defect: logged in detail, surfaced to users generically.
    #[error("Malformed {entity} record: {detail}")]
    MalformedRecord { entity: &'static str, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Transport errors ===
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A non-2xx response that maps to no more specific variant.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A fetch error observed through the query cache. The cache shares one
    /// error among all de-duplicated callers of the same fetch.
    #[error(transparent)]
    Shared(#[from] Arc<PactError>),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PactError {
    /// Error code string for programmatic handling.
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::AlreadyPending { .. } => "ALREADY_PENDING",
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::Json(_) => "JSON_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Shared(inner) => inner.error_code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Human-readable message suitable for a transient notification.
    ///
    /// Decode failures and internal errors are defects; their detail goes to
    /// the log, not the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { fields } => fields
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join("; "),
            Self::InvalidCredentials => "Incorrect email or password".into(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".into(),
            Self::Unauthorized => "You are not allowed to do that".into(),
            Self::NotFound { resource } => format!("{resource} not found"),
            Self::Conflict { message } => message.clone(),
            Self::AlreadyPending { .. } => "That request is already in progress".into(),
            Self::MalformedRecord { entity, detail } => {
                tracing::error!("malformed {entity} record: {detail}");
                "Something went wrong. Please try again.".into()
            }
            Self::Json(e) => {
                tracing::error!("JSON error: {e}");
                "Something went wrong. Please try again.".into()
            }
            Self::Network(_) => "Network error. Check your connection and try again.".into(),
            Self::Api { message, .. } => message.clone(),
            Self::Shared(inner) => inner.user_message(),
            Self::Internal(e) => {
                tracing::error!("internal error: {e}");
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

/// Convenience type alias for Results using PactError.
pub type PactResult<T> = Result<T, PactError>;
