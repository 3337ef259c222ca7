//! Session lifecycle.
//!
//! Process-wide auth state with an explicit `init()`/`teardown()` lifecycle
//! tied to application start and sign-out. The handle is cloned and passed
//! into the components that need it — no ambient globals.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{info, warn};

use pact_common::error::PactResult;
use pact_common::forms::check_form;
use pact_common::models::{RegisterRequest, User};

use crate::service::{AuthSession, DataService};

/// Observable auth state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

#[derive(Clone)]
pub struct Session {
    service: Arc<dyn DataService>,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self {
            service,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn set_loading(&self, loading: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading = loading;
    }

    fn apply(&self, auth: AuthSession) -> User {
        let user = auth.user;
        self.set(SessionState {
            user: Some(user.clone()),
            is_authenticated: true,
            is_loading: false,
        });
        user
    }

    /// Restore a persisted session at application start, if the service
    /// still honors one.
    pub async fn init(&self) -> PactResult<()> {
        self.set_loading(true);
        match self.service.restore_session().await {
            Ok(Some(auth)) => {
                info!(user = %auth.user.id, "session restored");
                self.apply(auth);
                Ok(())
            }
            Ok(None) => {
                self.set(SessionState::default());
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session restore failed");
                self.set(SessionState::default());
                Err(e)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> PactResult<User> {
        self.set_loading(true);
        match self.service.authenticate(email, password).await {
            Ok(auth) => {
                info!(user = %auth.user.id, "signed in");
                Ok(self.apply(auth))
            }
            Err(e) => {
                self.set(SessionState::default());
                Err(e)
            }
        }
    }

    /// Create an account and open a session. Validates locally first; a
    /// rejected form never reaches the network.
    pub async fn register(&self, request: &RegisterRequest) -> PactResult<User> {
        check_form(request, Utc::now())?;
        self.set_loading(true);
        match self
            .service
            .register(&request.email, &request.password, request.profile_fields())
            .await
        {
            Ok(auth) => {
                info!(user = %auth.user.id, "registered");
                Ok(self.apply(auth))
            }
            Err(e) => {
                self.set(SessionState::default());
                Err(e)
            }
        }
    }

    /// Sign out and clear all session state.
    pub async fn teardown(&self) -> PactResult<()> {
        let result = self.service.sign_out().await;
        self.set(SessionState::default());
        info!("session torn down");
        result
    }
}
