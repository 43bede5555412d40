//! Card administration
//!
//! Operator-side operations that sit next to the transfer engine: card
//! requests and their approval, direct issuing, topping up, blocking and
//! listing. Top-ups go through `adjust_balance`, so they share the
//! no-overdraft guarantee.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::account::{Account, AccountStore, CardNumber, CardRequest, CardType, ValidationError};
use crate::core_types::{CardId, RequestId, UserId};
use crate::money::{MoneyError, parse_amount};
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("Invalid card number: {0}")]
    InvalidCardNumber(#[from] ValidationError),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Card not found")]
    CardNotFound,

    #[error("Card number already issued")]
    DuplicateCard,

    /// Unknown request, or one that was already approved
    #[error("Pending card request not found")]
    RequestNotFound,

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AdminError {
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::InvalidCardNumber(_) => "INVALID_CARD_NUMBER",
            AdminError::InvalidAmount(_) => "INVALID_AMOUNT",
            AdminError::CardNotFound => "CARD_NOT_FOUND",
            AdminError::DuplicateCard => "DUPLICATE_CARD",
            AdminError::RequestNotFound => "REQUEST_NOT_FOUND",
            AdminError::Store(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AdminError::CardNotFound,
            StoreError::Duplicate(_) => AdminError::DuplicateCard,
            StoreError::BalanceOverflow => AdminError::InvalidAmount(MoneyError::Overflow),
            other => AdminError::Store(other),
        }
    }
}

pub struct CardAdmin {
    store: Arc<dyn AccountStore>,
}

impl CardAdmin {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Issue a zero-balance card to the owner identified by `phone`
    ///
    /// The owner record is created on first use.
    pub async fn issue_card(
        &self,
        phone: &str,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, AdminError> {
        let number = CardNumber::new(card_number)?;
        let owner = self.store.ensure_owner(phone).await?;
        let card = self
            .store
            .issue_card(owner, number.as_str(), card_type)
            .await?;

        info!(
            card_id = card.id,
            owner = owner,
            card_type = %card.card_type,
            "Card issued"
        );
        Ok(card)
    }

    /// Open a pending card request for the owner identified by `phone`
    pub async fn request_card(&self, phone: &str) -> Result<CardRequest, AdminError> {
        let owner = self.store.ensure_owner(phone).await?;
        let request = self.store.request_card(owner).await?;

        info!(request_id = request.id, owner, "Card requested");
        Ok(request)
    }

    pub async fn pending_requests(&self) -> Result<Vec<CardRequest>, AdminError> {
        Ok(self.store.pending_requests().await?)
    }

    /// Issue the requested card with an operator-chosen number and type
    pub async fn approve_request(
        &self,
        request_id: RequestId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, AdminError> {
        let number = CardNumber::new(card_number)?;
        let card = self
            .store
            .approve_request(request_id, number.as_str(), card_type)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AdminError::RequestNotFound,
                other => other.into(),
            })?;

        info!(
            request_id,
            card_id = card.id,
            owner = card.owner,
            card_type = %card.card_type,
            "Card request approved"
        );
        Ok(card)
    }

    /// Credit a card from outside the system
    pub async fn top_up(&self, card_id: CardId, amount: &str) -> Result<Account, AdminError> {
        let amount = parse_amount(amount)?;
        let card = self.store.adjust_balance(card_id, amount).await?;

        info!(card_id, amount = %amount, balance = %card.balance, "Card topped up");
        Ok(card)
    }

    /// Flip the block flag; returns the new state
    pub async fn toggle_block(&self, card_id: CardId) -> Result<bool, AdminError> {
        let blocked = self.store.toggle_block(card_id).await?;
        info!(card_id, blocked, "Card block state changed");
        Ok(blocked)
    }

    pub async fn cards_of(&self, owner: UserId) -> Result<Vec<Account>, AdminError> {
        Ok(self.store.cards_of(owner).await?)
    }
}
