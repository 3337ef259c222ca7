//! Mutation executor.
//!
//! Every write the platform supports is a [`Mutation`] variant. Execution
//! runs exactly one remote write, then applies the invalidations a static
//! table declares for that mutation kind and surfaces success/error
//! feedback. Failures invalidate nothing: previously cached data stays
//! bit-identical. There is no optimistic local write and no automatic retry
//! — the model is invalidate-and-refetch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use pact_common::error::{PactError, PactResult};
use pact_common::forms::check_form;
use pact_common::models::{
    CreateCommunityRequest, DepositRequest, JoinCommunityRequest, PlaceStakeRequest,
    SendMessageRequest, UpdateCommunityRequest, UpdateProfileRequest, UpdateProgressRequest,
    WithdrawRequest,
};

use crate::cache::{KeyPredicate, QueryCache, QueryKey};
use crate::feedback::FeedbackBus;
use crate::service::{DataService, EntityKind};

/// One write against the remote data service.
#[derive(Debug, Clone)]
pub enum Mutation {
    CreateCommunity(CreateCommunityRequest),
    UpdateCommunity {
        community_id: Uuid,
        request: UpdateCommunityRequest,
    },
    JoinCommunity(JoinCommunityRequest),
    LeaveCommunity {
        member_id: Uuid,
        community_id: Uuid,
        user_id: Uuid,
    },
    PlaceStake(PlaceStakeRequest),
    UpdateProgress(UpdateProgressRequest),
    SendMessage(SendMessageRequest),
    UpdateProfile {
        user_id: Uuid,
        request: UpdateProfileRequest,
    },
    Deposit(DepositRequest),
    Withdraw(WithdrawRequest),
    MarkNotificationRead {
        notification_id: Uuid,
        user_id: Uuid,
    },
}

impl Mutation {
    /// Stable identifier for duplicate-submission guarding.
    pub fn descriptor(&self) -> String {
        match self {
            Self::CreateCommunity(req) => format!("create_community:{}", req.name),
            Self::UpdateCommunity { community_id, .. } => {
                format!("update_community:{community_id}")
            }
            Self::JoinCommunity(req) => {
                format!("join_community:{}:{}", req.community_id, req.user_id)
            }
            Self::LeaveCommunity { member_id, .. } => format!("leave_community:{member_id}"),
            Self::PlaceStake(req) => {
                format!("place_stake:{}:{}", req.community_id, req.user_id)
            }
            Self::UpdateProgress(req) => format!("update_progress:{}", req.member_id),
            Self::SendMessage(req) => format!("send_message:{}", req.community_id),
            Self::UpdateProfile { user_id, .. } => format!("update_profile:{user_id}"),
            Self::Deposit(req) => format!("deposit:{}", req.user_id),
            Self::Withdraw(req) => format!("withdraw:{}", req.user_id),
            Self::MarkNotificationRead { notification_id, .. } => {
                format!("mark_notification_read:{notification_id}")
            }
        }
    }

    /// Local schema check. Runs to completion before any network call.
    pub fn validate(&self) -> PactResult<()> {
        let now = Utc::now();
        match self {
            Self::CreateCommunity(req) => check_form(req, now),
            Self::UpdateCommunity { request, .. } => check_form(request, now),
            Self::JoinCommunity(req) => check_form(req, now),
            Self::LeaveCommunity { .. } => Ok(()),
            Self::PlaceStake(req) => check_form(req, now),
            Self::UpdateProgress(req) => check_form(req, now),
            Self::SendMessage(req) => check_form(req, now),
            Self::UpdateProfile { request, .. } => check_form(request, now),
            Self::Deposit(req) => check_form(req, now),
            Self::Withdraw(req) => check_form(req, now),
            Self::MarkNotificationRead { .. } => Ok(()),
        }
    }

    /// Static table of cache keys affected by each mutation kind.
    pub fn affected_keys(&self) -> Vec<KeyPredicate> {
        match self {
            Self::CreateCommunity(_) => vec![KeyPredicate::Kind("communities")],
            Self::UpdateCommunity { community_id, .. } => vec![
                KeyPredicate::Exact(QueryKey::community(*community_id)),
                KeyPredicate::Kind("communities"),
            ],
            Self::JoinCommunity(req) => vec![
                KeyPredicate::Exact(QueryKey::community_members(req.community_id)),
                KeyPredicate::Exact(QueryKey::user_memberships(req.user_id)),
                // Member count is denormalized onto the community record.
                KeyPredicate::Exact(QueryKey::community(req.community_id)),
            ],
            Self::LeaveCommunity {
                community_id,
                user_id,
                ..
            } => vec![
                KeyPredicate::Exact(QueryKey::community_members(*community_id)),
                KeyPredicate::Exact(QueryKey::user_memberships(*user_id)),
                KeyPredicate::Exact(QueryKey::community(*community_id)),
            ],
            Self::PlaceStake(req) => vec![
                KeyPredicate::Exact(QueryKey::community_members(req.community_id)),
                KeyPredicate::Exact(QueryKey::wallet_transactions(req.user_id)),
            ],
            Self::UpdateProgress(req) => vec![
                KeyPredicate::Exact(QueryKey::progress_logs(req.member_id)),
                KeyPredicate::Exact(QueryKey::community_members(req.community_id)),
            ],
            Self::SendMessage(req) => {
                vec![KeyPredicate::Exact(QueryKey::messages(req.community_id))]
            }
            Self::UpdateProfile { user_id, .. } => {
                vec![KeyPredicate::Exact(QueryKey::user(*user_id))]
            }
            Self::Deposit(req) => vec![KeyPredicate::Exact(QueryKey::wallet_transactions(
                req.user_id,
            ))],
            Self::Withdraw(req) => vec![KeyPredicate::Exact(QueryKey::wallet_transactions(
                req.user_id,
            ))],
            Self::MarkNotificationRead { user_id, .. } => {
                vec![KeyPredicate::Exact(QueryKey::notifications(*user_id))]
            }
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::CreateCommunity(_) => "Community created",
            Self::UpdateCommunity { .. } => "Community updated",
            Self::JoinCommunity(_) => "Welcome to the community",
            Self::LeaveCommunity { .. } => "You left the community",
            Self::PlaceStake(_) => "Stake placed",
            Self::UpdateProgress(_) => "Progress recorded",
            Self::SendMessage(_) => "Message sent",
            Self::UpdateProfile { .. } => "Profile updated",
            Self::Deposit(_) => "Deposit submitted",
            Self::Withdraw(_) => "Withdrawal submitted",
            Self::MarkNotificationRead { .. } => "Notification dismissed",
        }
    }
}

/// Runs mutations and owns the pending-descriptor guard.
pub struct MutationExecutor {
    service: Arc<dyn DataService>,
    cache: QueryCache,
    feedback: FeedbackBus,
    pending: Mutex<HashSet<String>>,
}

impl MutationExecutor {
    pub fn new(service: Arc<dyn DataService>, cache: QueryCache, feedback: FeedbackBus) -> Self {
        Self {
            service,
            cache,
            feedback,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the same descriptor is currently in flight. Consumed by view
    /// code to disable duplicate submission.
    pub fn is_pending(&self, mutation: &Mutation) -> bool {
        self.pending().contains(&mutation.descriptor())
    }

    /// Run exactly one remote write.
    ///
    /// On success the declared cache keys are invalidated and a success
    /// toast is emitted. On failure no cache entry is touched and an error
    /// toast carries a human-readable message.
    pub async fn execute(&self, mutation: Mutation) -> PactResult<Value> {
        mutation.validate()?;

        let descriptor = mutation.descriptor();
        if !self.pending().insert(descriptor.clone()) {
            return Err(PactError::AlreadyPending {
                mutation: descriptor,
            });
        }
        let _guard = PendingGuard {
            executor: self,
            descriptor: &descriptor,
        };

        match self.perform(&mutation).await {
            Ok(entity) => {
                for predicate in mutation.affected_keys() {
                    self.cache.invalidate(&predicate);
                }
                info!(%descriptor, "mutation succeeded");
                self.feedback.success(mutation.success_message());
                Ok(entity)
            }
            Err(e) => {
                warn!(%descriptor, error = %e, "mutation failed");
                self.feedback.error(e.user_message());
                Err(e)
            }
        }
    }

    async fn perform(&self, mutation: &Mutation) -> PactResult<Value> {
        let service = &self.service;
        match mutation {
            Mutation::CreateCommunity(req) => {
                service.create(EntityKind::Communities, req.to_wire()).await
            }
            Mutation::UpdateCommunity {
                community_id,
                request,
            } => {
                service
                    .update(EntityKind::Communities, &community_id.to_string(), request.to_wire())
                    .await
            }
            Mutation::JoinCommunity(req) => {
                service.create(EntityKind::CommunityMembers, req.to_wire()).await
            }
            Mutation::LeaveCommunity { member_id, .. } => {
                service
                    .delete(EntityKind::CommunityMembers, &member_id.to_string())
                    .await?;
                Ok(Value::Null)
            }
            Mutation::PlaceStake(req) => {
                service
                    .create(EntityKind::WalletTransactions, req.to_wire())
                    .await
            }
            Mutation::UpdateProgress(req) => {
                service.create(EntityKind::ProgressLogs, req.to_wire()).await
            }
            Mutation::SendMessage(req) => {
                service.create(EntityKind::Messages, req.to_wire()).await
            }
            Mutation::UpdateProfile { user_id, request } => {
                service
                    .update(EntityKind::Users, &user_id.to_string(), request.to_wire())
                    .await
            }
            Mutation::Deposit(req) => {
                service
                    .create(EntityKind::WalletTransactions, req.to_wire())
                    .await
            }
            Mutation::Withdraw(req) => {
                service
                    .create(EntityKind::WalletTransactions, req.to_wire())
                    .await
            }
            Mutation::MarkNotificationRead {
                notification_id, ..
            } => {
                service
                    .update(
                        EntityKind::Notifications,
                        &notification_id.to_string(),
                        json!({ "read": true }),
                    )
                    .await
            }
        }
    }
}

struct PendingGuard<'a> {
    executor: &'a MutationExecutor,
    descriptor: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.executor.pending().remove(self.descriptor);
    }
}
