//! cardledger - Card-to-card funds transfer engine
//!
//! Moves money between cards and keeps an append-only ledger of every
//! transfer. The debit, the credit and the ledger record commit as one unit.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases (UserId, CardId, RecordId)
//! - [`money`] - Amount parsing and formatting
//! - [`account`] - Cards and the Account Store contract
//! - [`ledger`] - Transfer records and the Ledger contract
//! - [`store`] - PostgreSQL and in-memory backing stores
//! - [`transfer`] - Transfer engine and its error taxonomy
//! - [`query`] - Balance and history reads
//! - [`admin`] - Card issuance, top-up and blocking
//! - [`db`] - Connection pool and schema
//! - [`config`] / [`logging`] - Runtime configuration and tracing setup

// Core types - must be first!
pub mod core_types;

pub mod money;

pub mod account;
pub mod ledger;
pub mod store;

pub mod admin;
pub mod query;
pub mod transfer;

pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountStore, CardNumber, CardRequest, CardType, RequestStatus};
pub use admin::{AdminError, CardAdmin};
pub use core_types::{CardId, RecordId, RequestId, UserId};
pub use ledger::{Ledger, NewTransfer, TransferRecord};
pub use query::{Direction, HistoryEntry, QueryService};
pub use store::{MemoryStore, PgStore, StoreError, TransferStore};
pub use transfer::{TransferEngine, TransferError, TransferRequest, TransferResponse};
