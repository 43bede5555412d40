//! In-process backing store
//!
//! All state sits behind one `tokio::sync::Mutex`. Every operation acquires
//! it with a bounded wait, so the read-check-write of a transfer is
//! serialized and a stuck holder surfaces as `StoreError::Conflict` instead
//! of an indefinite wait.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::{CommitError, StoreError, TransferStore};
use crate::account::{Account, AccountStore, CardRequest, CardType, RequestStatus};
use crate::core_types::{CardId, RecordId, RequestId, UserId};
use crate::ledger::{Ledger, NewTransfer, TransferRecord};
use crate::money::max_balance;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub(crate) struct State {
    owners: HashMap<String, UserId>,
    cards: BTreeMap<CardId, Account>,
    by_number: HashMap<String, CardId>,
    requests: BTreeMap<RequestId, CardRequest>,
    transfers: Vec<TransferRecord>,
    last_owner_id: UserId,
    last_card_id: CardId,
    last_request_id: RequestId,
    last_record_id: RecordId,
}

/// `balance + delta`, bounded by zero below and `NUMERIC(20, 2)` above
fn shifted_balance(balance: Decimal, delta: Decimal) -> Result<Decimal, StoreError> {
    let new_balance = balance
        .checked_add(delta)
        .ok_or(StoreError::BalanceOverflow)?;
    if new_balance < Decimal::ZERO {
        return Err(StoreError::InsufficientFunds);
    }
    if new_balance > max_balance() {
        return Err(StoreError::BalanceOverflow);
    }
    Ok(new_balance)
}

impl State {
    fn apply_delta(&mut self, id: CardId, delta: Decimal) -> Result<Account, StoreError> {
        let card = self.cards.get_mut(&id).ok_or(StoreError::NotFound)?;
        card.balance = shifted_balance(card.balance, delta)?;
        Ok(card.clone())
    }

    fn has_owner(&self, owner: UserId) -> bool {
        self.owners.values().any(|id| *id == owner)
    }

    fn insert_card(
        &mut self,
        owner: UserId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError> {
        if self.by_number.contains_key(card_number) {
            return Err(StoreError::Duplicate(format!("card {}", card_number)));
        }

        self.last_card_id += 1;
        let account = Account {
            id: self.last_card_id,
            owner,
            card_number: card_number.to_string(),
            card_type,
            balance: Decimal::ZERO,
            blocked: false,
            created_at: Utc::now(),
        };
        self.by_number.insert(account.card_number.clone(), account.id);
        self.cards.insert(account.id, account.clone());
        Ok(account)
    }

    fn append(&mut self, transfer: &NewTransfer) -> TransferRecord {
        self.last_record_id += 1;

        // Keep created_at non-decreasing in append order
        let now = Utc::now();
        let created_at = match self.transfers.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let record = TransferRecord {
            id: self.last_record_id,
            from_account: transfer.from_account,
            to_account: transfer.to_account,
            amount: transfer.amount,
            note: transfer.note.clone(),
            created_at,
        };
        self.transfers.push(record.clone());
        record
    }
}

/// In-memory `TransferStore`
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    lock_timeout: Duration,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Lock wait bound for the non-transfer operations
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            lock_timeout,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every operation fails with `Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Sum of all card balances
    pub async fn total_balance(&self) -> Result<Decimal, StoreError> {
        let state = self.lock().await?;
        Ok(state.cards.values().map(|c| c.balance).sum())
    }

    /// Number of ledger records
    pub async fn ledger_len(&self) -> Result<usize, StoreError> {
        Ok(self.lock().await?.transfers.len())
    }

    /// Hold the state lock, as a concurrent writer would
    #[cfg(test)]
    pub(crate) async fn hold_lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().await
    }

    async fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.lock_within(self.lock_timeout).await
    }

    async fn lock_within(&self, timeout: Duration) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }

        tokio::time::timeout(timeout, self.state.lock())
            .await
            .map_err(|_| StoreError::Conflict(format!("lock wait exceeded {:?}", timeout)))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn lookup_by_number(&self, card_number: &str) -> Result<Option<Account>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .by_number
            .get(card_number)
            .and_then(|id| state.cards.get(id))
            .cloned())
    }

    async fn get(&self, id: CardId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().await?.cards.get(&id).cloned())
    }

    async fn adjust_balance(&self, id: CardId, delta: Decimal) -> Result<Account, StoreError> {
        self.lock().await?.apply_delta(id, delta)
    }

    async fn is_blocked(&self, id: CardId) -> Result<bool, StoreError> {
        let state = self.lock().await?;
        state
            .cards
            .get(&id)
            .map(|c| c.blocked)
            .ok_or(StoreError::NotFound)
    }

    async fn toggle_block(&self, id: CardId) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        let card = state.cards.get_mut(&id).ok_or(StoreError::NotFound)?;
        card.blocked = !card.blocked;
        Ok(card.blocked)
    }

    async fn ensure_owner(&self, phone: &str) -> Result<UserId, StoreError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(StoreError::InvalidRecord("phone must not be empty".into()));
        }

        let mut state = self.lock().await?;
        if let Some(id) = state.owners.get(phone) {
            return Ok(*id);
        }
        state.last_owner_id += 1;
        let id = state.last_owner_id;
        state.owners.insert(phone.to_string(), id);
        Ok(id)
    }

    async fn issue_card(
        &self,
        owner: UserId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError> {
        let mut state = self.lock().await?;
        if !state.has_owner(owner) {
            return Err(StoreError::NotFound);
        }
        state.insert_card(owner, card_number, card_type)
    }

    async fn cards_of(&self, owner: UserId) -> Result<Vec<Account>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .cards
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect())
    }

    async fn request_card(&self, owner: UserId) -> Result<CardRequest, StoreError> {
        let mut state = self.lock().await?;
        if !state.has_owner(owner) {
            return Err(StoreError::NotFound);
        }

        state.last_request_id += 1;
        let request = CardRequest {
            id: state.last_request_id,
            owner,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn pending_requests(&self) -> Result<Vec<CardRequest>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .requests
            .values()
            .rev()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn approve_request(
        &self,
        request_id: RequestId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError> {
        let mut state = self.lock().await?;
        let owner = match state.requests.get(&request_id) {
            Some(request) if request.status == RequestStatus::Pending => request.owner,
            _ => return Err(StoreError::NotFound),
        };

        // Card first: a duplicate number leaves the request pending
        let card = state.insert_card(owner, card_number, card_type)?;
        if let Some(request) = state.requests.get_mut(&request_id) {
            request.status = RequestStatus::Approved;
            request.processed_at = Some(Utc::now());
        }
        Ok(card)
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn append(&self, record: NewTransfer) -> Result<TransferRecord, StoreError> {
        record.validate()?;
        let mut state = self.lock().await?;
        if !state.cards.contains_key(&record.from_account)
            || !state.cards.contains_key(&record.to_account)
        {
            return Err(StoreError::NotFound);
        }
        Ok(state.append(&record))
    }

    async fn record(&self, id: RecordId) -> Result<Option<TransferRecord>, StoreError> {
        let state = self.lock().await?;
        Ok(state.transfers.iter().find(|r| r.id == id).cloned())
    }

    async fn history(
        &self,
        account: CardId,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .transfers
            .iter()
            .rev()
            .filter(|r| r.involves(account))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn commit_transfer(
        &self,
        transfer: &NewTransfer,
        lock_timeout: Duration,
    ) -> Result<TransferRecord, CommitError> {
        transfer.validate()?;
        let mut state = self.lock_within(lock_timeout).await?;

        // Re-check under lock: the caller's snapshot may be stale
        let source = state
            .cards
            .get(&transfer.from_account)
            .ok_or(CommitError::at_source(StoreError::NotFound))?;
        if source.blocked {
            return Err(CommitError::at_source(StoreError::Blocked));
        }
        if !source.can_cover(transfer.amount) {
            return Err(CommitError::at_source(StoreError::InsufficientFunds));
        }

        let destination = state
            .cards
            .get(&transfer.to_account)
            .ok_or(CommitError::at_destination(StoreError::NotFound))?;
        if destination.blocked {
            return Err(CommitError::at_destination(StoreError::Blocked));
        }
        shifted_balance(destination.balance, transfer.amount)
            .map_err(CommitError::at_destination)?;

        // Both legs are known to succeed; nothing below can fail half-way
        state
            .apply_delta(transfer.from_account, -transfer.amount)
            .map_err(CommitError::at_source)?;
        state
            .apply_delta(transfer.to_account, transfer.amount)
            .map_err(CommitError::at_destination)?;

        Ok(state.append(transfer))
    }
}
