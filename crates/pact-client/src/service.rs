//! Remote data service boundary.
//!
//! The backend owns all durable state; this crate only consumes it through
//! the narrow [`DataService`] interface. [`RestDataService`] is the
//! production implementation; tests substitute an in-memory double.

use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use pact_common::config::ApiConfig;
use pact_common::error::{PactError, PactResult};
use pact_common::models::{User, WireUser};
use pact_common::wire::decode_entity;

/// Entity kinds the backend exposes as collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Users,
    Communities,
    CommunityMembers,
    Messages,
    ProgressLogs,
    WalletTransactions,
    Notifications,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Communities => "communities",
            Self::CommunityMembers => "community_members",
            Self::Messages => "messages",
            Self::ProgressLogs => "progress_logs",
            Self::WalletTransactions => "wallet_transactions",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated session as reported by the backend.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
}

/// The remote data service contract.
///
/// Raw records travel as `serde_json::Value`; the domain mapper in
/// `pact-common` turns them into typed entities at the call sites.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn fetch_list(&self, kind: EntityKind, filter: &[(String, String)])
    -> PactResult<Vec<Value>>;
    async fn fetch_one(&self, kind: EntityKind, id: &str) -> PactResult<Value>;
    async fn create(&self, kind: EntityKind, fields: Value) -> PactResult<Value>;
    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> PactResult<Value>;
    async fn delete(&self, kind: EntityKind, id: &str) -> PactResult<()>;

    async fn authenticate(&self, email: &str, password: &str) -> PactResult<AuthSession>;
    async fn register(&self, email: &str, password: &str, profile: Value)
    -> PactResult<AuthSession>;
    async fn restore_session(&self) -> PactResult<Option<AuthSession>>;
    async fn sign_out(&self) -> PactResult<()>;
}

/// REST implementation of [`DataService`].
pub struct RestDataService {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl RestDataService {
    pub fn new(config: &ApiConfig) -> PactResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: RwLock::new(None),
        })
    }

    /// Resume with a previously persisted bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = RwLock::new(Some(token.into()));
        self
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn url(&self, path: &str) -> PactResult<Url> {
        Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| PactError::Internal(anyhow::anyhow!("invalid request url: {e}")))
    }

    /// Collection endpoint with the filter pairs percent-encoded into the
    /// query string.
    fn collection_url(&self, kind: EntityKind, filter: &[(String, String)]) -> PactResult<Url> {
        let mut url = self.url(&format!("/{kind}"))?;
        if !filter.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(filter.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> PactResult<Value> {
        let url = self.url(path)?;
        self.request_url(method, url, body).await
    }

    async fn request_url(&self, method: Method, url: Url, body: Option<&Value>) -> PactResult<Value> {
        debug!(%method, %url, "request");
        let mut req = self.client.request(method, url);
        if let Some(token) = self.token() {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
                .unwrap_or_else(|| status.to_string());
            return Err(map_status(status, message));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(resp.json::<Value>().await?)
    }

    fn decode_auth(&self, body: Value) -> PactResult<AuthSession> {
        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or(PactError::MalformedRecord {
                entity: "session",
                detail: "missing `access_token`".into(),
            })?
            .to_owned();
        let user_raw = body.get("user").cloned().ok_or(PactError::MalformedRecord {
            entity: "session",
            detail: "missing `user`".into(),
        })?;
        let user: User = decode_entity::<WireUser, User>("user", user_raw)?;
        self.set_token(Some(access_token.clone()));
        Ok(AuthSession { user, access_token })
    }
}

/// Map a non-2xx status into the error taxonomy.
fn map_status(status: StatusCode, message: String) -> PactError {
    match status {
        StatusCode::UNAUTHORIZED => PactError::Unauthorized,
        StatusCode::FORBIDDEN => PactError::Unauthorized,
        StatusCode::NOT_FOUND => PactError::NotFound { resource: message },
        StatusCode::CONFLICT => PactError::Conflict { message },
        _ => PactError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn fetch_list(
        &self,
        kind: EntityKind,
        filter: &[(String, String)],
    ) -> PactResult<Vec<Value>> {
        let url = self.collection_url(kind, filter)?;
        let body = self.request_url(Method::GET, url, None).await?;
        serde_json::from_value(body).map_err(PactError::from)
    }

    async fn fetch_one(&self, kind: EntityKind, id: &str) -> PactResult<Value> {
        self.request(Method::GET, &format!("/{kind}/{id}"), None).await
    }

    async fn create(&self, kind: EntityKind, fields: Value) -> PactResult<Value> {
        self.request(Method::POST, &format!("/{kind}"), Some(&fields)).await
    }

    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> PactResult<Value> {
        self.request(Method::PATCH, &format!("/{kind}/{id}"), Some(&partial)).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> PactResult<()> {
        self.request(Method::DELETE, &format!("/{kind}/{id}"), None).await?;
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> PactResult<AuthSession> {
        let body = serde_json::json!({ "email": email, "password": password });
        match self.request(Method::POST, "/auth/login", Some(&body)).await {
            Ok(resp) => self.decode_auth(resp),
            Err(PactError::Unauthorized) => Err(PactError::InvalidCredentials),
            Err(e) => Err(e),
        }
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        profile: Value,
    ) -> PactResult<AuthSession> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "profile": profile,
        });
        let resp = self.request(Method::POST, "/auth/register", Some(&body)).await?;
        self.decode_auth(resp)
    }

    async fn restore_session(&self) -> PactResult<Option<AuthSession>> {
        if self.token().is_none() {
            return Ok(None);
        }
        match self.request(Method::GET, "/auth/session", None).await {
            Ok(Value::Null) => Ok(None),
            Ok(resp) => Ok(Some(self.decode_auth(resp)?)),
            // A stored token the server no longer honors is a signed-out
            // state, not a failure.
            Err(PactError::Unauthorized) => {
                self.set_token(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self) -> PactResult<()> {
        let result = self.request(Method::POST, "/auth/logout", None).await;
        self.set_token(None);
        result.map(|_| ())
    }
}
