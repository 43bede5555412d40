//! Core types used throughout the system
//!
//! Identifiers are `i64` because they are PostgreSQL `BIGSERIAL` keys.

/// User ID - owner of one or more cards.
pub type UserId = i64;

/// Card ID - stable identifier of an account (card) for its lifetime.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Opaque**: Distinct from the card number, which is only a lookup key
pub type CardId = i64;

/// Ledger record ID - monotonic, assigned at append time
pub type RecordId = i64;

/// Card request ID - a pending ask for a new card, approved by an operator
pub type RequestId = i64;
