//! Funds transfer between two cards
//!
//! # Flow
//!
//! ```text
//! TransferRequest
//!     → validate amount / note
//!     → snapshot checks (source, destination, balance, blocked)
//!     → TransferStore::commit_transfer  (debit + credit + ledger append)
//!     → TransferRecord | TransferError
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All or nothing**: the debit, the credit and the ledger append commit together
//! 2. **No overdraft**: the balance check is repeated under the row locks
//! 3. **Conservation**: a successful transfer leaves the sum of balances unchanged
//! 4. **No silent retry**: a lost race surfaces as `ConflictRetryable`

pub mod engine;
pub mod error;
pub mod types;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use types::{ErrorResponse, TransferRequest, TransferResponse};
