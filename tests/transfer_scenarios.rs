use std::sync::Arc;

use rust_decimal::Decimal;

use cardledger::config::TransferConfig;
use cardledger::{
    AccountStore, CardAdmin, CardId, CardType, Direction, Ledger, MemoryStore, QueryService,
    TransferEngine, TransferError,
};

const A: &str = "4276000000000001";
const B: &str = "4276000000000002";
const C: &str = "4276000000000003";

struct Bank {
    store: Arc<MemoryStore>,
    engine: TransferEngine,
    query: QueryService,
    admin: CardAdmin,
}

impl Bank {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = TransferConfig::default();
        Self {
            engine: TransferEngine::new(store.clone(), &config),
            query: QueryService::new(store.clone(), config),
            admin: CardAdmin::new(store.clone()),
            store,
        }
    }

    /// Issue a card and fund it with `balance`
    async fn card(&self, number: &str, balance: &str) -> CardId {
        let card = self
            .admin
            .issue_card("+79990000000", number, CardType::Debit)
            .await
            .unwrap();
        if balance != "0" {
            self.admin.top_up(card.id, balance).await.unwrap();
        }
        card.id
    }

    async fn balance(&self, id: CardId) -> Decimal {
        self.query.balance(id).await.unwrap()
    }
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[tokio::test]
async fn scenario_successful_transfer_with_note() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;
    let b = bank.card(B, "0").await;

    let record = bank.engine.transfer(A, B, "40", Some("rent")).await.unwrap();

    assert_eq!(bank.balance(a).await, dec("60"));
    assert_eq!(bank.balance(b).await, dec("40"));
    assert_eq!(record.from_account, a);
    assert_eq!(record.to_account, b);
    assert_eq!(record.amount, dec("40"));
    assert_eq!(record.note.as_deref(), Some("rent"));

    // Exactly one record, retrievable by id
    assert_eq!(bank.store.ledger_len().await.unwrap(), 1);
    assert_eq!(bank.store.record(record.id).await.unwrap(), Some(record));
}

#[tokio::test]
async fn scenario_insufficient_funds_changes_nothing() {
    let bank = Bank::new();
    let a = bank.card(A, "10").await;
    let b = bank.card(B, "0").await;

    assert_eq!(
        bank.engine.transfer(A, B, "40", None).await,
        Err(TransferError::InsufficientFunds)
    );
    assert_eq!(bank.balance(a).await, dec("10"));
    assert_eq!(bank.balance(b).await, Decimal::ZERO);
    assert_eq!(bank.store.ledger_len().await.unwrap(), 0);
}

#[tokio::test]
async fn scenario_blocked_source() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;
    let b = bank.card(B, "0").await;
    assert!(bank.admin.toggle_block(a).await.unwrap());

    assert_eq!(
        bank.engine.transfer(A, B, "40", None).await,
        Err(TransferError::SourceBlocked)
    );
    assert_eq!(bank.balance(a).await, dec("100"));
    assert_eq!(bank.balance(b).await, Decimal::ZERO);
    assert_eq!(bank.store.ledger_len().await.unwrap(), 0);

    // Unblocking makes the same transfer go through
    assert!(!bank.admin.toggle_block(a).await.unwrap());
    assert!(bank.engine.transfer(A, B, "40", None).await.is_ok());
}

#[tokio::test]
async fn scenario_same_account_rejected() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;

    assert_eq!(
        bank.engine.transfer(A, A, "10", None).await,
        Err(TransferError::SameAccount)
    );
    assert_eq!(bank.balance(a).await, dec("100"));
    assert_eq!(bank.store.ledger_len().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_cards_are_reported_per_side() {
    let bank = Bank::new();
    bank.card(A, "100").await;

    assert_eq!(
        bank.engine.transfer(C, A, "1", None).await,
        Err(TransferError::SourceNotFound)
    );
    assert_eq!(
        bank.engine.transfer(A, C, "1", None).await,
        Err(TransferError::DestinationNotFound)
    );
}

#[tokio::test]
async fn invalid_amounts_are_rejected_before_any_lookup() {
    let bank = Bank::new();
    bank.card(A, "100").await;
    bank.card(B, "0").await;

    for amount in ["0", "-1", "abc", "", "1.001", "NaN"] {
        assert!(
            matches!(
                bank.engine.transfer(A, B, amount, None).await,
                Err(TransferError::InvalidAmount(_))
            ),
            "amount {:?} should be rejected",
            amount
        );
    }
    assert_eq!(bank.store.ledger_len().await.unwrap(), 0);
}

#[tokio::test]
async fn exact_balance_can_be_sent() {
    let bank = Bank::new();
    let a = bank.card(A, "40.25").await;
    let b = bank.card(B, "0").await;

    bank.engine.transfer(A, B, "40.25", None).await.unwrap();
    assert_eq!(bank.balance(a).await, Decimal::ZERO);
    assert_eq!(bank.balance(b).await, dec("40.25"));

    assert_eq!(
        bank.engine.transfer(A, B, "0.01", None).await,
        Err(TransferError::InsufficientFunds)
    );
}

#[tokio::test]
async fn ledger_replays_to_current_balances() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;
    let b = bank.card(B, "50").await;
    let c = bank.card(C, "0").await;
    let initial = [(a, dec("100")), (b, dec("50")), (c, Decimal::ZERO)];

    let moves = [
        (A, B, "10", Ok(())),
        (B, C, "35.50", Ok(())),
        (C, A, "5", Ok(())),
        (A, C, "200", Err(TransferError::InsufficientFunds)),
        (B, A, "0.50", Ok(())),
        (A, A, "1", Err(TransferError::SameAccount)),
    ];
    for (from, to, amount, expected) in moves {
        let outcome = bank
            .engine
            .transfer(from, to, amount, None)
            .await
            .map(|_| ());
        assert_eq!(outcome, expected, "{} -> {} amount {}", from, to, amount);
    }

    assert_eq!(bank.store.ledger_len().await.unwrap(), 4);
    assert_eq!(bank.balance(a).await, dec("95.5"));
    assert_eq!(bank.balance(b).await, dec("24"));
    assert_eq!(bank.balance(c).await, dec("30.5"));

    for (id, start) in initial {
        let records = bank.store.history(id, 100).await.unwrap();
        let replayed = records.iter().fold(start, |acc, r| {
            if r.from_account == id {
                acc - r.amount
            } else {
                acc + r.amount
            }
        });
        assert_eq!(replayed, bank.balance(id).await, "card {}", id);
    }

    assert_eq!(bank.store.total_balance().await.unwrap(), dec("150"));
}

#[tokio::test]
async fn history_lists_both_directions_most_recent_first() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;
    let b = bank.card(B, "0").await;
    let c = bank.card(C, "0").await;

    bank.engine.transfer(A, B, "10", Some("first")).await.unwrap();
    bank.engine.transfer(A, C, "20", None).await.unwrap();
    bank.engine.transfer(B, A, "5", Some("back")).await.unwrap();

    let history = bank.query.history(a, None).await.unwrap();
    let summary: Vec<_> = history
        .iter()
        .map(|e| (e.direction, e.counterparty_account, e.amount))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Direction::Credit, b, dec("5")),
            (Direction::Debit, c, dec("20")),
            (Direction::Debit, b, dec("10")),
        ]
    );
    assert_eq!(history[0].note.as_deref(), Some("back"));

    // C only sees the one transfer it took part in
    let history = bank.query.history(c, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].direction, Direction::Credit);

    assert_eq!(bank.query.history(a, Some(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_store_leaves_state_untouched() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;
    let b = bank.card(B, "0").await;

    bank.store.set_unavailable(true);
    let result = bank.engine.transfer(A, B, "40", None).await;
    bank.store.set_unavailable(false);

    let err = result.unwrap_err();
    assert!(matches!(err, TransferError::StoreUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(bank.balance(a).await, dec("100"));
    assert_eq!(bank.balance(b).await, Decimal::ZERO);
    assert_eq!(bank.store.ledger_len().await.unwrap(), 0);
}

#[tokio::test]
async fn adjust_balance_never_goes_negative() {
    let bank = Bank::new();
    let a = bank.card(A, "10").await;

    assert!(bank.store.adjust_balance(a, dec("-10.01")).await.is_err());
    assert_eq!(bank.balance(a).await, dec("10"));
    let card = bank.store.adjust_balance(a, dec("-10")).await.unwrap();
    assert_eq!(card.balance, Decimal::ZERO);
}

#[tokio::test]
async fn requested_card_can_receive_transfers_once_approved() {
    let bank = Bank::new();
    let a = bank.card(A, "100").await;

    let request = bank.admin.request_card("+79991112233").await.unwrap();
    assert_eq!(
        bank.engine.transfer(A, B, "10", None).await,
        Err(TransferError::DestinationNotFound)
    );

    let b = bank
        .admin
        .approve_request(request.id, B, CardType::Credit)
        .await
        .unwrap();
    assert!(bank.admin.pending_requests().await.unwrap().is_empty());

    bank.engine.transfer(A, B, "10", None).await.unwrap();
    assert_eq!(bank.balance(a).await, dec("90"));
    assert_eq!(bank.balance(b.id).await, dec("10"));
}
