//! Wallet ledger model.
//!
//! Transactions are append-only facts; the balance is a server-derived
//! aggregate the client only ever reads. There is no client-side
//! reconciliation — the service is the sole authority on balance
//! correctness and on stake/refund idempotency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::error::PactError;
use crate::forms::FormRequest;
use crate::wire::{malformed, parse_id, parse_ts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Stake,
    Refund,
    Reward,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Stake => "stake",
            Self::Refund => "refund",
            Self::Reward => "reward",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, PactError> {
        match raw {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "stake" => Ok(Self::Stake),
            "refund" => Ok(Self::Refund),
            "reward" => Ok(Self::Reward),
            other => Err(malformed(
                "wallet_transaction",
                "transaction_type",
                format!("unknown value `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, PactError> {
        match raw {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(malformed(
                "wallet_transaction",
                "status",
                format!("unknown value `{other}`"),
            )),
        }
    }
}

/// One ledger entry. The amount is signed: debits (withdrawals, stakes) are
/// negative, credits (deposits, refunds, rewards) positive.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub community_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Backend wire form of a ledger record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireWalletTransaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub transaction_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    pub created_at: String,
}

impl TryFrom<WireWalletTransaction> for WalletTransaction {
    type Error = PactError;

    fn try_from(w: WireWalletTransaction) -> Result<Self, PactError> {
        const ENTITY: &str = "wallet_transaction";
        Ok(Self {
            id: parse_id(ENTITY, "id", &w.id)?,
            user_id: parse_id(ENTITY, "user_id", &w.user_id)?,
            amount: w.amount,
            transaction_type: TransactionType::parse(&w.transaction_type)?,
            status: TransactionStatus::parse(&w.status)?,
            community_id: w
                .community_id
                .as_deref()
                .map(|id| parse_id(ENTITY, "community_id", id))
                .transpose()?,
            created_at: parse_ts(ENTITY, "created_at", &w.created_at)?,
        })
    }
}

impl From<&WalletTransaction> for WireWalletTransaction {
    fn from(t: &WalletTransaction) -> Self {
        Self {
            id: t.id.to_string(),
            user_id: t.user_id.to_string(),
            amount: t.amount,
            transaction_type: t.transaction_type.as_str().into(),
            status: t.status.as_str().into(),
            community_id: t.community_id.map(|id| id.to_string()),
            created_at: t.created_at.to_rfc3339(),
        }
    }
}

/// Deposit into the wallet.
#[derive(Debug, Clone, Validate)]
pub struct DepositRequest {
    pub user_id: Uuid,

    #[validate(range(min = 0.01, message = "Deposit amount must be positive"))]
    pub amount: f64,
}

impl FormRequest for DepositRequest {}

impl DepositRequest {
    pub fn to_wire(&self) -> Value {
        json!({
            "user_id": self.user_id.to_string(),
            "transaction_type": TransactionType::Deposit.as_str(),
            "amount": self.amount,
        })
    }
}

/// Withdraw from the wallet. The server rejects overdrafts; the client does
/// not track a local balance to check against.
#[derive(Debug, Clone, Validate)]
pub struct WithdrawRequest {
    pub user_id: Uuid,

    #[validate(range(min = 0.01, message = "Withdrawal amount must be positive"))]
    pub amount: f64,
}

impl FormRequest for WithdrawRequest {}

impl WithdrawRequest {
    pub fn to_wire(&self) -> Value {
        json!({
            "user_id": self.user_id.to_string(),
            "transaction_type": TransactionType::Withdrawal.as_str(),
            "amount": self.amount,
        })
    }
}

/// Commit a stake to a community.
#[derive(Debug, Clone, Validate)]
pub struct PlaceStakeRequest {
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub member_id: Uuid,

    #[validate(range(min = 1.0, message = "Stake must be at least 1"))]
    pub amount: f64,
}

impl FormRequest for PlaceStakeRequest {}

impl PlaceStakeRequest {
    pub fn to_wire(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("user_id".into(), json!(self.user_id.to_string()));
        fields.insert("community_id".into(), json!(self.community_id.to_string()));
        fields.insert("member_id".into(), json!(self.member_id.to_string()));
        fields.insert(
            "transaction_type".into(),
            json!(TransactionType::Stake.as_str()),
        );
        fields.insert("amount".into(), json!(self.amount));
        Value::Object(fields)
    }
}
