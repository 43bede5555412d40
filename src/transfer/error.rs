//! Transfer Error Types
//!
//! One variant per failure mode. Every failure leaves balances and the
//! ledger exactly as they were before the call.

use thiserror::Error;

use crate::money::MoneyError;
use crate::store::{CommitError, Leg, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid note: {0}")]
    InvalidNote(String),

    #[error("Source and destination card cannot be the same")]
    SameAccount,

    // === Account Errors ===
    #[error("Source card not found")]
    SourceNotFound,

    #[error("Destination card not found")]
    DestinationNotFound,

    #[error("Source card is blocked")]
    SourceBlocked,

    #[error("Destination card is blocked")]
    DestinationBlocked,

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Crediting the destination would push it past the largest storable balance
    #[error("Destination balance would exceed the maximum")]
    BalanceOverflow,

    // === System Errors ===
    /// Lost a race at commit time; nothing was applied, resubmitting is safe
    #[error("Concurrent conflict, retry: {0}")]
    ConflictRetryable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TransferError {
    /// Stable machine-readable kind for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::InvalidNote(_) => "INVALID_NOTE",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::SourceNotFound => "SOURCE_NOT_FOUND",
            TransferError::DestinationNotFound => "DESTINATION_NOT_FOUND",
            TransferError::SourceBlocked => "SOURCE_BLOCKED",
            TransferError::DestinationBlocked => "DESTINATION_BLOCKED",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::BalanceOverflow => "BALANCE_OVERFLOW",
            TransferError::ConflictRetryable(_) => "CONFLICT_RETRYABLE",
            TransferError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount(_)
            | TransferError::InvalidNote(_)
            | TransferError::SameAccount
            | TransferError::InsufficientFunds
            | TransferError::BalanceOverflow => 400,
            TransferError::SourceBlocked | TransferError::DestinationBlocked => 403,
            TransferError::SourceNotFound | TransferError::DestinationNotFound => 404,
            TransferError::ConflictRetryable(_) => 409,
            TransferError::StoreUnavailable(_) => 503,
        }
    }

    /// True if resubmitting the identical request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::ConflictRetryable(_) | TransferError::StoreUnavailable(_)
        )
    }
}

impl From<MoneyError> for TransferError {
    fn from(e: MoneyError) -> Self {
        TransferError::InvalidAmount(e.to_string())
    }
}

impl From<StoreError> for TransferError {
    /// Infrastructure mapping for store errors outside a specific leg
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => TransferError::ConflictRetryable(msg),
            StoreError::BalanceOverflow => TransferError::BalanceOverflow,
            other => TransferError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<CommitError> for TransferError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Rejected { leg, reason } => match (leg, reason) {
                (Leg::Source, StoreError::NotFound) => TransferError::SourceNotFound,
                (Leg::Source, StoreError::Blocked) => TransferError::SourceBlocked,
                (Leg::Source, StoreError::InsufficientFunds) => TransferError::InsufficientFunds,
                (Leg::Destination, StoreError::NotFound) => TransferError::DestinationNotFound,
                (Leg::Destination, StoreError::Blocked) => TransferError::DestinationBlocked,
                (_, other) => other.into(),
            },
            CommitError::Store(StoreError::InvalidRecord(msg)) => TransferError::InvalidAmount(msg),
            CommitError::Store(other) => other.into(),
        }
    }
}
