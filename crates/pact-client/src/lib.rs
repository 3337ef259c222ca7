//! Pact client runtime.
//!
//! The data-synchronization layer for Pact UIs: a query cache with fetch
//! de-duplication and invalidation propagation, a mutation executor with
//! declared invalidations and user-visible feedback, a guarded submission
//! flow, and session lifecycle — all against a pluggable remote data
//! service.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pact_client::PactClient;
//!
//! #[tokio::main]
//! async fn main() -> pact_common::PactResult<()> {
//!     let config = pact_common::config::load().map_err(anyhow::Error::from)?;
//!     let client = PactClient::new(config)?;
//!     client.session().init().await?;
//!     client.start_sweeper();
//!
//!     let communities = client.communities().await?;
//!     println!("{} communities", communities.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod feedback;
pub mod mutation;
pub mod service;
pub mod session;
pub mod submit;

pub use cache::{CacheSnapshot, CacheSubscription, KeyPredicate, QueryCache, QueryKey, QueryStatus};
pub use client::PactClient;
pub use feedback::{Feedback, FeedbackBus, FeedbackLevel};
pub use mutation::{Mutation, MutationExecutor};
pub use service::{AuthSession, DataService, EntityKind, RestDataService};
pub use session::{Session, SessionState};
pub use submit::{SubmitFlow, SubmitOutcome, SubmitState};
