//! Query Service
//!
//! Read-only views over the Account Store and the Ledger. Every call is a
//! fresh read; nothing is cached between calls.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::TransferConfig;
use crate::core_types::{CardId, RecordId};
use crate::ledger::TransferRecord;
use crate::store::{StoreError, TransferStore};

/// Direction of a history entry, seen from the queried card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money left the queried card
    Debit,
    /// Money arrived on the queried card
    Credit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Debit => write!(f, "debit"),
            Direction::Credit => write!(f, "credit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub record_id: RecordId,
    pub counterparty_account: CardId,
    pub direction: Direction,
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// View `record` from the side of `account`
    pub fn from_record(account: CardId, record: TransferRecord) -> Self {
        let (direction, counterparty_account) = if record.from_account == account {
            (Direction::Debit, record.to_account)
        } else {
            (Direction::Credit, record.from_account)
        };
        Self {
            record_id: record.id,
            counterparty_account,
            direction,
            amount: record.amount,
            note: record.note,
            created_at: record.created_at,
        }
    }
}

pub struct QueryService {
    store: Arc<dyn TransferStore>,
    config: TransferConfig,
}

impl QueryService {
    pub fn new(store: Arc<dyn TransferStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    /// Current balance of a card
    pub async fn balance(&self, account: CardId) -> Result<Decimal, StoreError> {
        self.store
            .get(account)
            .await?
            .map(|card| card.balance)
            .ok_or(StoreError::NotFound)
    }

    /// Balance lookup by (canonical) card number
    pub async fn balance_by_number(&self, card_number: &str) -> Result<Decimal, StoreError> {
        self.store
            .lookup_by_number(card_number)
            .await?
            .map(|card| card.balance)
            .ok_or(StoreError::NotFound)
    }

    /// Transfers touching `account`, most recent first
    ///
    /// `limit` defaults to `history_default_limit` and is clamped to
    /// `[1, history_max_limit]`.
    pub async fn history(
        &self,
        account: CardId,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        if self.store.get(account).await?.is_none() {
            return Err(StoreError::NotFound);
        }

        let limit = self.config.clamp_limit(limit);
        let records = self.store.history(account, limit).await?;
        Ok(records
            .into_iter()
            .map(|record| HistoryEntry::from_record(account, record))
            .collect())
    }
}
