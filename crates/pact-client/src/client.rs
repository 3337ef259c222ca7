//! High-level `PactClient` combining service, cache, session, and mutations.

use std::sync::Arc;

use serde_json::Value;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use uuid::Uuid;

use pact_common::config::ClientConfig;
use pact_common::error::{PactError, PactResult};
use pact_common::models::{
    Community, CommunityMember, CreateCommunityRequest, DepositRequest, JoinCommunityRequest,
    Message, Notification, PlaceStakeRequest, ProgressLog, SendMessageRequest,
    UpdateCommunityRequest, UpdateProfileRequest, UpdateProgressRequest, User, WalletTransaction,
    WireCommunity, WireCommunityMember, WireMessage, WireNotification, WireProgressLog, WireUser,
    WireWalletTransaction, WithdrawRequest,
};
use pact_common::wire::{decode_entity, decode_list};

use crate::cache::{CacheSubscription, QueryCache, QueryKey};
use crate::feedback::{Feedback, FeedbackBus};
use crate::mutation::{Mutation, MutationExecutor};
use crate::service::{DataService, EntityKind, RestDataService};
use crate::session::Session;
use crate::submit::SubmitFlow;

/// The main Pact client.
///
/// ```rust,no_run
/// use pact_client::PactClient;
///
/// #[tokio::main]
/// async fn main() -> pact_common::PactResult<()> {
///     let config = pact_common::config::load().map_err(anyhow::Error::from)?;
///     let client = PactClient::new(config)?;
///     client.session().init().await?;
///
///     for community in client.communities().await? {
///         println!("{} — {}", community.name, community.goal);
///     }
///     Ok(())
/// }
/// ```
pub struct PactClient {
    config: ClientConfig,
    service: Arc<dyn DataService>,
    cache: QueryCache,
    session: Session,
    executor: Arc<MutationExecutor>,
    feedback: FeedbackBus,
}

impl PactClient {
    pub fn new(config: ClientConfig) -> PactResult<Self> {
        let service = Arc::new(RestDataService::new(&config.api)?);
        Ok(Self::with_service(config, service))
    }

    /// Build against any [`DataService`] implementation. The seam tests use
    /// to substitute an in-memory backend.
    pub fn with_service(config: ClientConfig, service: Arc<dyn DataService>) -> Self {
        let cache = QueryCache::new(std::time::Duration::from_secs(config.cache.grace_secs));
        let feedback = FeedbackBus::new(config.feedback.buffer);
        let executor = Arc::new(MutationExecutor::new(
            Arc::clone(&service),
            cache.clone(),
            feedback.clone(),
        ));
        let session = Session::new(Arc::clone(&service));
        Self {
            config,
            service,
            cache,
            session,
            executor,
            feedback,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn feedback(&self) -> broadcast::Receiver<Feedback> {
        self.feedback.subscribe()
    }

    /// A fresh guarded submission flow for one form.
    pub fn submit_flow(&self) -> SubmitFlow {
        SubmitFlow::new(Arc::clone(&self.executor))
    }

    pub fn is_pending(&self, mutation: &Mutation) -> bool {
        self.executor.is_pending(mutation)
    }

    /// Subscribe to cache updates for one key, pinning its entry.
    pub fn watch(&self, key: QueryKey) -> CacheSubscription {
        self.cache.subscribe(key)
    }

    /// Start the background eviction sweep.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.cache
            .spawn_sweeper(std::time::Duration::from_secs(self.config.cache.sweep_secs))
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    async fn list<W, T>(
        &self,
        entity: &'static str,
        key: QueryKey,
        kind: EntityKind,
        filter: Vec<(String, String)>,
    ) -> PactResult<Vec<T>>
    where
        W: DeserializeOwned,
        T: TryFrom<W, Error = PactError>,
    {
        let service = Arc::clone(&self.service);
        let raw = self
            .cache
            .ensure_fresh(key, move || async move {
                let rows = service.fetch_list(kind, &filter).await?;
                Ok(Value::Array(rows))
            })
            .await?;
        decode_list::<W, T>(entity, raw)
    }

    async fn one<W, T>(
        &self,
        entity: &'static str,
        key: QueryKey,
        kind: EntityKind,
        id: Uuid,
    ) -> PactResult<T>
    where
        W: DeserializeOwned,
        T: TryFrom<W, Error = PactError>,
    {
        let service = Arc::clone(&self.service);
        let raw = self
            .cache
            .ensure_fresh(key, move || async move {
                service.fetch_one(kind, &id.to_string()).await
            })
            .await?;
        decode_entity::<W, T>(entity, raw)
    }

    pub async fn communities(&self) -> PactResult<Vec<Community>> {
        self.list::<WireCommunity, _>(
            "community",
            QueryKey::communities(),
            EntityKind::Communities,
            vec![],
        )
        .await
    }

    pub async fn community(&self, id: Uuid) -> PactResult<Community> {
        self.one::<WireCommunity, _>("community", QueryKey::community(id), EntityKind::Communities, id)
            .await
    }

    pub async fn community_members(&self, community_id: Uuid) -> PactResult<Vec<CommunityMember>> {
        self.list::<WireCommunityMember, _>(
            "community_member",
            QueryKey::community_members(community_id),
            EntityKind::CommunityMembers,
            vec![("community_id".into(), community_id.to_string())],
        )
        .await
    }

    pub async fn user_memberships(&self, user_id: Uuid) -> PactResult<Vec<CommunityMember>> {
        self.list::<WireCommunityMember, _>(
            "community_member",
            QueryKey::user_memberships(user_id),
            EntityKind::CommunityMembers,
            vec![("user_id".into(), user_id.to_string())],
        )
        .await
    }

    pub async fn messages(&self, community_id: Uuid) -> PactResult<Vec<Message>> {
        self.list::<WireMessage, _>(
            "message",
            QueryKey::messages(community_id),
            EntityKind::Messages,
            vec![("community_id".into(), community_id.to_string())],
        )
        .await
    }

    pub async fn progress_logs(&self, member_id: Uuid) -> PactResult<Vec<ProgressLog>> {
        self.list::<WireProgressLog, _>(
            "progress_log",
            QueryKey::progress_logs(member_id),
            EntityKind::ProgressLogs,
            vec![("member_id".into(), member_id.to_string())],
        )
        .await
    }

    pub async fn wallet_transactions(&self, user_id: Uuid) -> PactResult<Vec<WalletTransaction>> {
        self.list::<WireWalletTransaction, _>(
            "wallet_transaction",
            QueryKey::wallet_transactions(user_id),
            EntityKind::WalletTransactions,
            vec![("user_id".into(), user_id.to_string())],
        )
        .await
    }

    pub async fn notifications(&self, user_id: Uuid) -> PactResult<Vec<Notification>> {
        self.list::<WireNotification, _>(
            "notification",
            QueryKey::notifications(user_id),
            EntityKind::Notifications,
            vec![("user_id".into(), user_id.to_string())],
        )
        .await
    }

    pub async fn user(&self, id: Uuid) -> PactResult<User> {
        self.one::<WireUser, _>("user", QueryKey::user(id), EntityKind::Users, id)
            .await
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    pub async fn create_community(&self, request: CreateCommunityRequest) -> PactResult<Community> {
        let raw = self.executor.execute(Mutation::CreateCommunity(request)).await?;
        decode_entity::<WireCommunity, _>("community", raw)
    }

    pub async fn update_community(
        &self,
        community_id: Uuid,
        request: UpdateCommunityRequest,
    ) -> PactResult<Community> {
        let raw = self
            .executor
            .execute(Mutation::UpdateCommunity {
                community_id,
                request,
            })
            .await?;
        decode_entity::<WireCommunity, _>("community", raw)
    }

    pub async fn join_community(
        &self,
        request: JoinCommunityRequest,
    ) -> PactResult<CommunityMember> {
        let raw = self.executor.execute(Mutation::JoinCommunity(request)).await?;
        decode_entity::<WireCommunityMember, _>("community_member", raw)
    }

    pub async fn leave_community(
        &self,
        member_id: Uuid,
        community_id: Uuid,
        user_id: Uuid,
    ) -> PactResult<()> {
        self.executor
            .execute(Mutation::LeaveCommunity {
                member_id,
                community_id,
                user_id,
            })
            .await?;
        Ok(())
    }

    pub async fn place_stake(&self, request: PlaceStakeRequest) -> PactResult<WalletTransaction> {
        let raw = self.executor.execute(Mutation::PlaceStake(request)).await?;
        decode_entity::<WireWalletTransaction, _>("wallet_transaction", raw)
    }

    pub async fn update_progress(&self, request: UpdateProgressRequest) -> PactResult<ProgressLog> {
        let raw = self.executor.execute(Mutation::UpdateProgress(request)).await?;
        decode_entity::<WireProgressLog, _>("progress_log", raw)
    }

    pub async fn send_message(&self, request: SendMessageRequest) -> PactResult<Message> {
        let raw = self.executor.execute(Mutation::SendMessage(request)).await?;
        decode_entity::<WireMessage, _>("message", raw)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> PactResult<User> {
        let raw = self
            .executor
            .execute(Mutation::UpdateProfile { user_id, request })
            .await?;
        decode_entity::<WireUser, _>("user", raw)
    }

    pub async fn deposit(&self, request: DepositRequest) -> PactResult<WalletTransaction> {
        let raw = self.executor.execute(Mutation::Deposit(request)).await?;
        decode_entity::<WireWalletTransaction, _>("wallet_transaction", raw)
    }

    pub async fn withdraw(&self, request: WithdrawRequest) -> PactResult<WalletTransaction> {
        let raw = self.executor.execute(Mutation::Withdraw(request)).await?;
        decode_entity::<WireWalletTransaction, _>("wallet_transaction", raw)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> PactResult<Notification> {
        let raw = self
            .executor
            .execute(Mutation::MarkNotificationRead {
                notification_id,
                user_id,
            })
            .await?;
        decode_entity::<WireNotification, _>("notification", raw)
    }
}
