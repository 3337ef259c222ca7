//! In-memory `DataService` double shared by the integration suites.
//!
//! Counts every call so tests can assert that rejected input never reaches
//! the "network", and mimics the server-side rules the client relies on:
//! idempotent membership (duplicate join conflicts) and append-only
//! progress logs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Notify;
use uuid::Uuid;

use pact_client::{AuthSession, DataService, EntityKind, PactClient};
use pact_common::config::ClientConfig;
use pact_common::error::{PactError, PactResult};
use pact_common::models::User;

#[derive(Default)]
struct Tables {
    communities: Vec<Value>,
    members: Vec<Value>,
    messages: Vec<Value>,
    progress_logs: Vec<Value>,
    transactions: Vec<Value>,
    notifications: Vec<Value>,
}

pub struct InMemoryService {
    tables: Mutex<Tables>,
    /// Total service calls observed, auth included.
    pub calls: AtomicUsize,
    /// When set, the next write fails with this error.
    fail_next: Mutex<Option<PactError>>,
    /// When set, writes block until notified.
    gate: Mutex<Option<Arc<Notify>>>,
    restorable: Mutex<Option<AuthSession>>,
}

impl InMemoryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(Tables::default()),
            calls: AtomicUsize::new(0),
            fail_next: Mutex::new(None),
            gate: Mutex::new(None),
            restorable: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_write(&self, error: PactError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Hold every subsequent write open until the returned handle is
    /// notified.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn release_writes(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub fn set_restorable(&self, auth: AuthSession) {
        *self.restorable.lock().unwrap() = Some(auth);
    }

    pub fn progress_log_records(&self) -> Vec<Value> {
        self.tables.lock().unwrap().progress_logs.clone()
    }

    pub fn member_records(&self) -> Vec<Value> {
        self.tables.lock().unwrap().members.clone()
    }

    pub fn seed_community(&self, record: Value) {
        self.tables.lock().unwrap().communities.push(record);
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn write_barrier(&self) -> PactResult<()> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }
}

fn matches_filter(record: &Value, filter: &[(String, String)]) -> bool {
    filter.iter().all(|(field, expected)| {
        record
            .get(field)
            .and_then(|v| v.as_str())
            .is_some_and(|v| v == expected)
    })
}

fn merge(base: &mut Value, partial: &Value) {
    if let (Some(base), Some(partial)) = (base.as_object_mut(), partial.as_object()) {
        for (k, v) in partial {
            base.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl DataService for InMemoryService {
    async fn fetch_list(
        &self,
        kind: EntityKind,
        filter: &[(String, String)],
    ) -> PactResult<Vec<Value>> {
        self.tick();
        let tables = self.tables.lock().unwrap();
        let rows = match kind {
            EntityKind::Communities => &tables.communities,
            EntityKind::CommunityMembers => &tables.members,
            EntityKind::Messages => &tables.messages,
            EntityKind::ProgressLogs => &tables.progress_logs,
            EntityKind::WalletTransactions => &tables.transactions,
            EntityKind::Notifications => &tables.notifications,
            EntityKind::Users => return Ok(vec![]),
        };
        Ok(rows
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect())
    }

    async fn fetch_one(&self, kind: EntityKind, id: &str) -> PactResult<Value> {
        self.tick();
        let tables = self.tables.lock().unwrap();
        let rows = match kind {
            EntityKind::Communities => &tables.communities,
            EntityKind::CommunityMembers => &tables.members,
            EntityKind::Notifications => &tables.notifications,
            _ => {
                return Err(PactError::NotFound {
                    resource: kind.to_string(),
                });
            }
        };
        rows.iter()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            .cloned()
            .ok_or(PactError::NotFound {
                resource: kind.to_string(),
            })
    }

    async fn create(&self, kind: EntityKind, fields: Value) -> PactResult<Value> {
        self.tick();
        self.write_barrier().await?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let mut tables = self.tables.lock().unwrap();
        match kind {
            EntityKind::Communities => {
                let mut record = fields;
                merge(
                    &mut record,
                    &json!({
                        "id": id,
                        "status": "pending",
                        "creator_id": Uuid::now_v7().to_string(),
                        "member_count": 0,
                        "created_at": now,
                    }),
                );
                tables.communities.push(record.clone());
                Ok(record)
            }
            EntityKind::CommunityMembers => {
                let duplicate = tables.members.iter().any(|m| {
                    m.get("community_id") == fields.get("community_id")
                        && m.get("user_id") == fields.get("user_id")
                });
                if duplicate {
                    return Err(PactError::Conflict {
                        message: "Already a member of this community".into(),
                    });
                }
                let mut record = fields;
                merge(
                    &mut record,
                    &json!({
                        "id": id,
                        "has_staked": false,
                        "progress": 0.0,
                        "status": "pending",
                        "joined_at": now,
                    }),
                );
                tables.members.push(record.clone());
                Ok(record)
            }
            EntityKind::ProgressLogs => {
                let mut record = fields;
                merge(&mut record, &json!({ "id": id, "created_at": now }));
                tables.progress_logs.push(record.clone());
                Ok(record)
            }
            EntityKind::Messages => {
                let mut record = fields;
                merge(&mut record, &json!({ "id": id, "created_at": now }));
                tables.messages.push(record.clone());
                Ok(record)
            }
            EntityKind::WalletTransactions => {
                let mut record = fields;
                merge(
                    &mut record,
                    &json!({ "id": id, "status": "pending", "created_at": now }),
                );
                tables.transactions.push(record.clone());
                Ok(record)
            }
            _ => Err(PactError::Api {
                status: 400,
                message: format!("cannot create {kind}"),
            }),
        }
    }

    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> PactResult<Value> {
        self.tick();
        self.write_barrier().await?;

        let mut tables = self.tables.lock().unwrap();
        let rows = match kind {
            EntityKind::Communities => &mut tables.communities,
            EntityKind::CommunityMembers => &mut tables.members,
            EntityKind::Notifications => &mut tables.notifications,
            EntityKind::Users => {
                // No user table in the double; echo a merged record.
                let mut record = json!({
                    "id": id,
                    "display_name": "Avery",
                    "email": "avery@example.com",
                    "joined_at": Utc::now().to_rfc3339(),
                });
                merge(&mut record, &partial);
                return Ok(record);
            }
            _ => {
                return Err(PactError::NotFound {
                    resource: kind.to_string(),
                });
            }
        };
        let record = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            .ok_or(PactError::NotFound {
                resource: kind.to_string(),
            })?;
        merge(record, &partial);
        Ok(record.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> PactResult<()> {
        self.tick();
        self.write_barrier().await?;

        let mut tables = self.tables.lock().unwrap();
        if kind == EntityKind::CommunityMembers {
            tables
                .members
                .retain(|m| m.get("id").and_then(|v| v.as_str()) != Some(id));
        }
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> PactResult<AuthSession> {
        self.tick();
        if email == "avery@example.com" && password == "correct horse" {
            Ok(fixture_auth())
        } else {
            Err(PactError::InvalidCredentials)
        }
    }

    async fn register(
        &self,
        email: &str,
        _password: &str,
        profile: Value,
    ) -> PactResult<AuthSession> {
        self.tick();
        let mut auth = fixture_auth();
        auth.user.email = email.to_owned();
        if let Some(name) = profile.get("display_name").and_then(|v| v.as_str()) {
            auth.user.display_name = name.to_owned();
        }
        Ok(auth)
    }

    async fn restore_session(&self) -> PactResult<Option<AuthSession>> {
        self.tick();
        Ok(self.restorable.lock().unwrap().clone())
    }

    async fn sign_out(&self) -> PactResult<()> {
        self.tick();
        Ok(())
    }
}

pub fn fixture_user() -> User {
    User {
        id: Uuid::parse_str("0192c7a1-0000-7c3d-8e4f-5a6b7c8d9e0f").unwrap(),
        display_name: "Avery".into(),
        email: "avery@example.com".into(),
        avatar: None,
        joined_at: Utc::now(),
    }
}

pub fn fixture_auth() -> AuthSession {
    AuthSession {
        user: fixture_user(),
        access_token: "test-token".into(),
    }
}

static TRACING: Once = Once::new();

/// Route log output through the test writer, honoring `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn client_with(service: Arc<InMemoryService>) -> PactClient {
    init_tracing();
    PactClient::with_service(ClientConfig::default(), service)
}
