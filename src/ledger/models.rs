use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core_types::{CardId, RecordId};
use crate::store::StoreError;

/// Maximum note length in characters (`transfers.note VARCHAR(255)`)
pub const MAX_NOTE_LEN: usize = 255;

/// Immutable ledger record of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: RecordId,
    pub from_account: CardId,
    pub to_account: CardId,
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// True if `account` is the source or the destination
    pub fn involves(&self, account: CardId) -> bool {
        self.from_account == account || self.to_account == account
    }
}

/// Fields of a record before the ledger assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from_account: CardId,
    pub to_account: CardId,
    pub amount: Decimal,
    pub note: Option<String>,
}

impl NewTransfer {
    /// Record-level invariants every ledger implementation enforces on append
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.amount <= Decimal::ZERO {
            return Err(StoreError::InvalidRecord(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.from_account == self.to_account {
            return Err(StoreError::InvalidRecord(
                "from_account and to_account must differ".to_string(),
            ));
        }
        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_LEN {
                return Err(StoreError::InvalidRecord(format!(
                    "note exceeds {} characters",
                    MAX_NOTE_LEN
                )));
            }
        }
        Ok(())
    }
}
