//! Domain models and their wire forms.

pub mod community;
pub mod member;
pub mod message;
pub mod notification;
pub mod progress;
pub mod user;
pub mod wallet;

pub use community::{
    Community, CommunityStatus, CreateCommunityRequest, UpdateCommunityRequest, Visibility,
    WireCommunity,
};
pub use member::{CommunityMember, JoinCommunityRequest, WireCommunityMember};
pub use message::{Message, SendMessageRequest, WireMessage};
pub use notification::{Notification, NotificationPayload, WireNotification};
pub use progress::{ProgressLog, UpdateProgressRequest, WireProgressLog};
pub use user::{RegisterRequest, UpdateProfileRequest, User, WireUser};
pub use wallet::{
    DepositRequest, PlaceStakeRequest, TransactionStatus, TransactionType, WalletTransaction,
    WireWalletTransaction, WithdrawRequest,
};
