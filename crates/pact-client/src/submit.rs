//! Guarded submission flow.
//!
//! The state machine for one form:
//! `Idle → Validating → {Rejected → Idle, Submitting} → {Succeeded → Idle,
//! Failed → Idle}`. Re-entrant submission while `Submitting` is refused, and
//! a validation rejection never reaches the network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use pact_common::error::PactError;
use pact_common::forms::FieldErrors;

use crate::mutation::{Mutation, MutationExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
}

/// Terminal result of one submission attempt.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The write succeeded; carries the raw entity the server returned.
    Succeeded(Value),
    /// Validation rejected the input locally. No network call was made.
    Rejected(FieldErrors),
    /// The remote write failed.
    Failed(PactError),
    /// A submission is already in flight; this one was refused.
    InFlight,
}

/// One form's submission guard.
pub struct SubmitFlow {
    executor: Arc<MutationExecutor>,
    state: Mutex<SubmitState>,
}

impl SubmitFlow {
    pub fn new(executor: Arc<MutationExecutor>) -> Self {
        Self {
            executor,
            state: Mutex::new(SubmitState::Idle),
        }
    }

    fn state_mut(&self) -> MutexGuard<'_, SubmitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SubmitState {
        *self.state_mut()
    }

    /// Validate, then submit. Refused outright while a prior submission is
    /// still in flight.
    pub async fn submit(&self, mutation: Mutation) -> SubmitOutcome {
        {
            let mut state = self.state_mut();
            if *state == SubmitState::Submitting {
                return SubmitOutcome::InFlight;
            }
            *state = SubmitState::Validating;
            if let Err(e) = mutation.validate() {
                *state = SubmitState::Idle;
                return match e {
                    PactError::Validation { fields } => SubmitOutcome::Rejected(fields),
                    other => SubmitOutcome::Failed(other),
                };
            }
            *state = SubmitState::Submitting;
        }

        let result = self.executor.execute(mutation).await;
        *self.state_mut() = SubmitState::Idle;
        match result {
            Ok(entity) => SubmitOutcome::Succeeded(entity),
            Err(e) => SubmitOutcome::Failed(e),
        }
    }
}
