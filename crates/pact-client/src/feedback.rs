//! Transient user-visible feedback.
//!
//! Mutations and session operations publish success/error toasts here; UI
//! layers subscribe and render them however they like. Fire-and-forget: if
//! nobody is listening the send is dropped silently.

use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackLevel {
    Success,
    Error,
}

/// One toast.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
}

#[derive(Clone)]
pub struct FeedbackBus {
    tx: broadcast::Sender<Feedback>,
}

impl FeedbackBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Feedback> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!(%message, "feedback");
        let _ = self.tx.send(Feedback {
            level: FeedbackLevel::Success,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "feedback");
        let _ = self.tx.send(Feedback {
            level: FeedbackLevel::Error,
            message,
        });
    }
}
