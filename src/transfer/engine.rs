//! Transfer Engine
//!
//! Validates a transfer against a snapshot of both cards, then hands the
//! debit/credit/append triple to the store as one atomic unit.
//!
//! ```text
//! amount → source → source blocked → source balance
//!        → destination → same card → destination blocked
//!        → commit_transfer (re-check under lock, all or nothing)
//! ```
//!
//! The first failing check returns; nothing has been written at that point.
//! The engine never retries: `ConflictRetryable` goes back to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::error::TransferError;
use super::types::{TransferRequest, TransferResponse, normalize_note};
use crate::account::{Account, CardNumber};
use crate::config::TransferConfig;
use crate::ledger::{NewTransfer, TransferRecord};
use crate::money::parse_amount;
use crate::store::TransferStore;

pub struct TransferEngine {
    store: Arc<dyn TransferStore>,
    lock_timeout: Duration,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn TransferStore>, config: &TransferConfig) -> Self {
        Self {
            store,
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Move `amount` from one card to another and record it in the ledger
    ///
    /// Returns the appended record (with its id and timestamp).
    pub async fn transfer(
        &self,
        from_card_number: &str,
        to_card_number: &str,
        amount: &str,
        note: Option<&str>,
    ) -> Result<TransferRecord, TransferError> {
        let result = self
            .try_transfer(from_card_number, to_card_number, amount, note)
            .await;

        match &result {
            Ok(record) => info!(
                record_id = record.id,
                from = record.from_account,
                to = record.to_account,
                amount = %record.amount,
                "Transfer completed"
            ),
            Err(e @ TransferError::StoreUnavailable(_)) => error!(
                kind = e.code(),
                from = from_card_number,
                to = to_card_number,
                "Transfer failed: {}",
                e
            ),
            Err(e) => warn!(
                kind = e.code(),
                from = from_card_number,
                to = to_card_number,
                amount = amount,
                "Transfer rejected: {}",
                e
            ),
        }

        result
    }

    /// [`transfer`](Self::transfer) driven by a request value
    pub async fn submit(&self, req: &TransferRequest) -> Result<TransferResponse, TransferError> {
        let record = self
            .transfer(
                &req.from_card_number,
                &req.to_card_number,
                &req.amount,
                req.note.as_deref(),
            )
            .await?;
        Ok(TransferResponse::from(&record))
    }

    async fn try_transfer(
        &self,
        from_card_number: &str,
        to_card_number: &str,
        amount: &str,
        note: Option<&str>,
    ) -> Result<TransferRecord, TransferError> {
        // Amount and note
        let amount = parse_amount(amount)?;
        let note = normalize_note(note)?;

        // Source: exists, not blocked, covers the amount
        let source = self
            .resolve(from_card_number)
            .await?
            .ok_or(TransferError::SourceNotFound)?;
        if source.blocked {
            return Err(TransferError::SourceBlocked);
        }
        if !source.can_cover(amount) {
            return Err(TransferError::InsufficientFunds);
        }

        // Destination: exists, is another card, not blocked
        let destination = self
            .resolve(to_card_number)
            .await?
            .ok_or(TransferError::DestinationNotFound)?;
        if destination.id == source.id {
            return Err(TransferError::SameAccount);
        }
        if destination.blocked {
            return Err(TransferError::DestinationBlocked);
        }

        let transfer = NewTransfer {
            from_account: source.id,
            to_account: destination.id,
            amount,
            note,
        };

        // Past this point the unit runs to completion even if the caller goes away
        let store = Arc::clone(&self.store);
        let lock_timeout = self.lock_timeout;
        let commit =
            tokio::spawn(async move { store.commit_transfer(&transfer, lock_timeout).await });

        match commit.await {
            Ok(result) => result.map_err(TransferError::from),
            Err(join_err) => Err(TransferError::StoreUnavailable(format!(
                "commit task failed: {}",
                join_err
            ))),
        }
    }

    /// Card numbers that fail validation cannot exist in the store
    async fn resolve(&self, card_number: &str) -> Result<Option<Account>, TransferError> {
        let Ok(number) = CardNumber::new(card_number) else {
            return Ok(None);
        };
        Ok(self.store.lookup_by_number(number.as_str()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountStore, CardType};
    use crate::ledger::Ledger;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    const A: &str = "4000000000000001";
    const B: &str = "4000000000000002";

    async fn setup(balance_a: i64, balance_b: i64) -> (Arc<MemoryStore>, TransferEngine) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.ensure_owner("+79990000000").await.unwrap();
        let a = store.issue_card(owner, A, CardType::Debit).await.unwrap();
        let b = store.issue_card(owner, B, CardType::Debit).await.unwrap();
        if balance_a > 0 {
            store.adjust_balance(a.id, Decimal::from(balance_a)).await.unwrap();
        }
        if balance_b > 0 {
            store.adjust_balance(b.id, Decimal::from(balance_b)).await.unwrap();
        }

        let config = TransferConfig {
            lock_timeout_ms: 50,
            ..TransferConfig::default()
        };
        let engine = TransferEngine::new(store.clone(), &config);
        (store, engine)
    }

    async fn balance(store: &MemoryStore, card: &str) -> Decimal {
        store.lookup_by_number(card).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_check_order_amount_before_lookup() {
        let (_, engine) = setup(100, 0).await;
        assert!(matches!(
            engine.transfer("0000000000000000", B, "0", None).await,
            Err(TransferError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_check_order_source_before_destination() {
        let (store, engine) = setup(10, 0).await;
        assert_eq!(
            engine.transfer("0000000000000000", "garbage", "1", None).await,
            Err(TransferError::SourceNotFound)
        );

        // Insufficient funds is reported before a missing destination
        assert_eq!(
            engine.transfer(A, "0000000000000000", "40", None).await,
            Err(TransferError::InsufficientFunds)
        );
        assert_eq!(
            engine.transfer(A, "0000000000000000", "5", None).await,
            Err(TransferError::DestinationNotFound)
        );

        // Blocked source is reported before insufficient funds
        let a = store.lookup_by_number(A).await.unwrap().unwrap();
        store.toggle_block(a.id).await.unwrap();
        assert_eq!(
            engine.transfer(A, B, "40", None).await,
            Err(TransferError::SourceBlocked)
        );
    }

    #[tokio::test]
    async fn test_destination_blocked() {
        let (store, engine) = setup(10, 0).await;
        let b = store.lookup_by_number(B).await.unwrap().unwrap();
        store.toggle_block(b.id).await.unwrap();

        assert_eq!(
            engine.transfer(A, B, "1", None).await,
            Err(TransferError::DestinationBlocked)
        );
        assert_eq!(balance(&store, A).await, Decimal::from(10));
        assert_eq!(store.ledger_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_same_card_rejected_with_formatting_variants() {
        let (store, engine) = setup(100, 0).await;
        assert_eq!(
            engine.transfer(A, "4000 0000 0000 0001", "10", None).await,
            Err(TransferError::SameAccount)
        );
        assert_eq!(store.ledger_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_note_is_trimmed_and_bounded() {
        let (store, engine) = setup(100, 0).await;
        let record = engine.transfer(A, B, "1", Some("  rent ")).await.unwrap();
        assert_eq!(record.note.as_deref(), Some("rent"));

        let record = engine.transfer(A, B, "1", Some("")).await.unwrap();
        assert_eq!(record.note, None);

        let long = "n".repeat(300);
        assert!(matches!(
            engine.transfer(A, B, "1", Some(&long)).await,
            Err(TransferError::InvalidNote(_))
        ));
        assert_eq!(store.ledger_len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lock_timeout_is_conflict_retryable() {
        let (store, engine) = setup(100, 0).await;

        let a = store.lookup_by_number(A).await.unwrap().unwrap();
        let b = store.lookup_by_number(B).await.unwrap().unwrap();

        // Snapshot reads would also wait on the held lock, so commit directly
        let guard = store.hold_lock().await;

        let result = engine
            .store
            .commit_transfer(
                &NewTransfer {
                    from_account: a.id,
                    to_account: b.id,
                    amount: Decimal::ONE,
                    note: None,
                },
                engine.lock_timeout,
            )
            .await
            .map_err(TransferError::from);
        drop(guard);

        assert!(matches!(result, Err(TransferError::ConflictRetryable(_))));
        assert_eq!(balance(&store, A).await, Decimal::from(100));
        assert_eq!(store.ledger_len().await.unwrap(), 0);

        // Identical resubmission succeeds once the lock is free
        assert!(engine.transfer(A, B, "1", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let (store, engine) = setup(100, 0).await;
        store.set_unavailable(true);
        let result = engine.transfer(A, B, "1", None).await;
        store.set_unavailable(false);

        assert!(matches!(result, Err(TransferError::StoreUnavailable(_))));
        assert_eq!(balance(&store, A).await, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_submit_returns_response() {
        let (store, engine) = setup(100, 0).await;
        let response = engine
            .submit(&TransferRequest {
                from_card_number: A.to_string(),
                to_card_number: B.to_string(),
                amount: "40".to_string(),
                note: Some("rent".to_string()),
            })
            .await
            .unwrap();

        assert!(response.success);
        let record = store.record(response.record_id).await.unwrap().unwrap();
        assert_eq!(record.amount, Decimal::from(40));
        assert_eq!(record.created_at, response.created_at);
    }

    #[tokio::test]
    async fn test_destination_at_max_balance_rejects_credit() {
        let (store, engine) = setup(100, 0).await;
        let b = store.lookup_by_number(B).await.unwrap().unwrap();
        store
            .adjust_balance(b.id, crate::money::max_balance())
            .await
            .unwrap();

        assert_eq!(
            engine.transfer(A, B, "0.01", None).await,
            Err(TransferError::BalanceOverflow)
        );
        assert_eq!(balance(&store, A).await, Decimal::from(100));
        assert_eq!(balance(&store, B).await, crate::money::max_balance());
        assert_eq!(store.ledger_len().await.unwrap(), 0);
    }
}
