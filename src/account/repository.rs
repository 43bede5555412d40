//! Account Store contract
//!
//! Durable mapping from card id to owner, balance and block state.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::models::{Account, CardRequest, CardType};
use crate::core_types::{CardId, RequestId, UserId};
use crate::store::StoreError;

/// Account Store
///
/// Implementations guarantee:
/// - `adjust_balance` is the sole mutator of `balance` and applies
///   `balance += delta` as ONE conditional update; it never leaves a negative balance
/// - reads of `balance` and `blocked` reflect the latest committed write
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve a card by its canonical card number
    async fn lookup_by_number(&self, card_number: &str) -> Result<Option<Account>, StoreError>;

    async fn get(&self, id: CardId) -> Result<Option<Account>, StoreError>;

    /// Apply `balance += delta`
    ///
    /// # Errors
    /// * `InsufficientFunds` - the result would be negative (nothing applied)
    /// * `BalanceOverflow` - the result would not fit `NUMERIC(20, 2)` (nothing applied)
    /// * `NotFound` - no such card
    async fn adjust_balance(&self, id: CardId, delta: Decimal) -> Result<Account, StoreError>;

    /// Current block state (`NotFound` for unknown cards)
    async fn is_blocked(&self, id: CardId) -> Result<bool, StoreError>;

    /// Flip the block flag and return the new state
    async fn toggle_block(&self, id: CardId) -> Result<bool, StoreError>;

    /// Return the owner id for `phone`, creating the owner record if needed
    async fn ensure_owner(&self, phone: &str) -> Result<UserId, StoreError>;

    /// Issue a card with zero balance, unblocked
    ///
    /// # Errors
    /// * `Duplicate` - card number already issued
    /// * `NotFound` - owner does not exist
    async fn issue_card(
        &self,
        owner: UserId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError>;

    /// All cards of an owner, ordered by id
    async fn cards_of(&self, owner: UserId) -> Result<Vec<Account>, StoreError>;

    /// Open a pending card request (`NotFound` for an unknown owner)
    async fn request_card(&self, owner: UserId) -> Result<CardRequest, StoreError>;

    /// Pending requests, newest first
    async fn pending_requests(&self) -> Result<Vec<CardRequest>, StoreError>;

    /// Issue the card for a pending request and mark it approved, atomically
    ///
    /// # Errors
    /// * `NotFound` - no such request, or it was already processed
    /// * `Duplicate` - card number already issued (request stays pending)
    async fn approve_request(
        &self,
        request_id: RequestId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError>;
}
