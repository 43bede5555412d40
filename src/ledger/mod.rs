//! Ledger - append-only transfer history
//!
//! Every successful transfer produces exactly one `TransferRecord` naming
//! both cards. Records are immutable once appended.

pub mod models;
pub mod repository;

pub use models::{MAX_NOTE_LEN, NewTransfer, TransferRecord};
pub use repository::Ledger;
