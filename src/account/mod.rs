//! Account (card) management module
//!
//! Card records, card requests, the `AccountStore` contract and card number
//! validation.

pub mod models;
pub mod repository;
pub mod validation;

pub use models::{Account, CardRequest, CardType, RequestStatus};
pub use repository::AccountStore;
pub use validation::{CardNumber, ValidationError};
