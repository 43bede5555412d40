//! Backing stores
//!
//! # Architecture
//!
//! A `TransferStore` is one backing store that implements both the
//! Account Store and the Ledger contracts, plus the atomic unit the transfer
//! engine commits:
//!
//! ```text
//!   lock(source, destination)      ← row locks, bounded wait
//!   re-check blocked / balance     ← snapshot may be stale
//!   debit source                   ← conditional update
//!   credit destination
//!   append ledger record
//!   COMMIT                         ← all or nothing
//! ```
//!
//! # Implementations
//! - [`PgStore`]: PostgreSQL, `SELECT ... FOR UPDATE` with `lock_timeout`
//! - [`MemoryStore`]: in-process, one async mutex with a bounded acquire

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::account::AccountStore;
use crate::ledger::{Ledger, NewTransfer, TransferRecord};

/// Which side of a transfer a commit-time rejection refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Source,
    Destination,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Source => f.write_str("source"),
            Leg::Destination => f.write_str("destination"),
        }
    }
}

/// Failure of the atomic transfer unit. Nothing was applied in either case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// A re-check under lock failed for one of the two cards
    #[error("{leg} account rejected: {reason}")]
    Rejected { leg: Leg, reason: StoreError },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommitError {
    pub fn at_source(reason: StoreError) -> Self {
        CommitError::Rejected {
            leg: Leg::Source,
            reason,
        }
    }

    pub fn at_destination(reason: StoreError) -> Self {
        CommitError::Rejected {
            leg: Leg::Destination,
            reason,
        }
    }
}

impl From<sqlx::Error> for CommitError {
    fn from(e: sqlx::Error) -> Self {
        CommitError::Store(e.into())
    }
}

/// Account Store + Ledger with an atomic debit/credit/append unit
#[async_trait]
pub trait TransferStore: AccountStore + Ledger {
    /// Debit `from_account`, credit `to_account` and append the record, atomically
    ///
    /// Waits at most `lock_timeout` for the two cards; a timeout is reported
    /// as `StoreError::Conflict`. Blocked cards, an insufficient source
    /// balance and a credit past the maximum balance are checked under lock
    /// and reported as `Rejected`.
    async fn commit_transfer(
        &self,
        transfer: &NewTransfer,
        lock_timeout: Duration,
    ) -> Result<TransferRecord, CommitError>;
}
