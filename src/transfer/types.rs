//! Transfer request/response values
//!
//! Shapes only; wire framing belongs to whoever exposes the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::core_types::RecordId;
use crate::ledger::{MAX_NOTE_LEN, TransferRecord};
use crate::money::format_amount;

/// Transfer request
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_card_number: String,
    pub to_card_number: String,
    /// Amount as string (to avoid float precision issues)
    pub amount: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Transfer success response
#[derive(Debug, Clone, Serialize)]
pub struct TransferResponse {
    pub success: bool,
    pub record_id: RecordId,
    pub amount: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

impl From<&TransferRecord> for TransferResponse {
    fn from(record: &TransferRecord) -> Self {
        Self {
            success: true,
            record_id: record.id,
            amount: format_amount(record.amount),
            created_at: record.created_at,
            message: "Transfer completed".to_string(),
        }
    }
}

/// Failure response: stable `kind` plus a human-readable message
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&TransferError> for ErrorResponse {
    fn from(e: &TransferError) -> Self {
        Self {
            success: false,
            kind: e.code(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// Trim the note; blank becomes `None`
pub fn normalize_note(note: Option<&str>) -> Result<Option<String>, TransferError> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    let len = note.chars().count();
    if len > MAX_NOTE_LEN {
        return Err(TransferError::InvalidNote(format!(
            "note is {} characters, max {}",
            len, MAX_NOTE_LEN
        )));
    }
    Ok(Some(note.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_normalize_note() {
        assert_eq!(normalize_note(None).unwrap(), None);
        assert_eq!(normalize_note(Some("   ")).unwrap(), None);
        assert_eq!(normalize_note(Some(" rent ")).unwrap(), Some("rent".into()));
        assert!(matches!(
            normalize_note(Some(&"x".repeat(MAX_NOTE_LEN + 1))),
            Err(TransferError::InvalidNote(_))
        ));
    }

    #[test]
    fn test_request_note_is_optional() {
        let req: TransferRequest = serde_json::from_str(
            r#"{"from_card_number":"4000000000000001","to_card_number":"4000000000000002","amount":"40"}"#,
        )
        .unwrap();
        assert!(req.note.is_none());
        assert_eq!(req.amount, "40");
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(ErrorResponse::from(&TransferError::SourceBlocked)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "SOURCE_BLOCKED");
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn test_success_response_shape() {
        let record = TransferRecord {
            id: 7,
            from_account: 1,
            to_account: 2,
            amount: Decimal::from(40),
            note: Some("rent".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(TransferResponse::from(&record)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["record_id"], 7);
        assert_eq!(json["amount"], "40.00");
    }
}
