//! Data models for cards (accounts)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{CardId, RequestId, UserId};

/// Card type, stored as text in `cards.card_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Debit,
    Credit,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Debit => "debit",
            CardType::Credit => "credit",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(CardType::Debit),
            "credit" => Ok(CardType::Credit),
            other => Err(format!("unknown card type: {}", other)),
        }
    }
}

/// A balance-holding card
///
/// `balance` is only ever changed through `AccountStore::adjust_balance`
/// (or the atomic transfer commit, which uses the same conditional update),
/// and is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: CardId,
    pub owner: UserId,
    pub card_number: String,
    pub card_type: CardType,
    pub balance: Decimal,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Lifecycle of a card request: `pending` until an operator approves it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// A user's ask for a card; approving it issues the card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRequest {
    pub id: RequestId,
    pub owner: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
