use async_trait::async_trait;

use super::models::{NewTransfer, TransferRecord};
use crate::core_types::{CardId, RecordId};
use crate::store::StoreError;

/// Append-only transfer ledger
///
/// There is no update or delete operation. A record is visible only once the
/// balance mutations it describes have committed.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Assign id + timestamp and durably write the record
    ///
    /// Rejects `amount <= 0` and `from_account == to_account` with `InvalidRecord`.
    async fn append(&self, record: NewTransfer) -> Result<TransferRecord, StoreError>;

    async fn record(&self, id: RecordId) -> Result<Option<TransferRecord>, StoreError>;

    /// Records where `account` is source or destination, most recent first
    /// (descending id), at most `limit` entries. Each call is a fresh query.
    async fn history(&self, account: CardId, limit: u32)
    -> Result<Vec<TransferRecord>, StoreError>;
}
