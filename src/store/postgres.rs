//! PostgreSQL backing store
//!
//! Balance changes are single conditional updates
//! (`UPDATE ... WHERE balance + $delta >= 0`). A transfer locks both card rows
//! `FOR UPDATE` in ascending id order inside one transaction, with
//! `lock_timeout` bounding the wait, then debits, credits and inserts the
//! ledger row before `COMMIT`. Any early return drops the transaction, which
//! rolls back all three writes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;

use super::{CommitError, StoreError, TransferStore};
use crate::account::{Account, AccountStore, CardRequest, CardType, RequestStatus};
use crate::core_types::{CardId, RecordId, RequestId, UserId};
use crate::db::Database;
use crate::ledger::{Ledger, NewTransfer, TransferRecord};

/// PostgreSQL `TransferStore` over the `cards` and `transfers` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let card_type: String = row.try_get("card_type")?;
    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        card_number: row.try_get("card_number")?,
        card_type: card_type.parse::<CardType>().map_err(StoreError::Corrupt)?,
        balance: row.try_get("balance")?,
        blocked: row.try_get("is_blocked")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_request(row: &PgRow) -> Result<CardRequest, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(CardRequest {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        status: status.parse::<RequestStatus>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn row_to_record(row: &PgRow) -> Result<TransferRecord, StoreError> {
    Ok(TransferRecord {
        id: row.try_get("id")?,
        from_account: row.try_get("from_card_id")?,
        to_account: row.try_get("to_card_id")?,
        amount: row.try_get("amount")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Statements shared by the pool path and the transfer transaction
// ============================================================================

/// The one balance mutator: `balance += delta` unless the result is negative
///
/// A result past `NUMERIC(20, 2)` fails with SQLSTATE 22003 (`BalanceOverflow`).
async fn apply_delta(
    conn: &mut PgConnection,
    id: CardId,
    delta: Decimal,
) -> Result<Account, StoreError> {
    let row = sqlx::query(
        r#"UPDATE cards SET balance = balance + $2
           WHERE id = $1 AND balance + $2 >= 0
           RETURNING id, owner_id, card_number, card_type, balance, is_blocked, created_at"#,
    )
    .bind(id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row_to_account(&row),
        None => {
            let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM cards WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            if exists.is_some() {
                Err(StoreError::InsufficientFunds)
            } else {
                Err(StoreError::NotFound)
            }
        }
    }
}

async fn insert_card(
    conn: &mut PgConnection,
    owner: UserId,
    card_number: &str,
    card_type: CardType,
) -> Result<Account, StoreError> {
    let row = sqlx::query(
        r#"INSERT INTO cards (owner_id, card_number, card_type, balance)
           VALUES ($1, $2, $3, 0)
           RETURNING id, owner_id, card_number, card_type, balance, is_blocked, created_at"#,
    )
    .bind(owner)
    .bind(card_number)
    .bind(card_type.as_str())
    .fetch_one(&mut *conn)
    .await?;

    row_to_account(&row)
}

async fn insert_record(
    conn: &mut PgConnection,
    record: &NewTransfer,
) -> Result<TransferRecord, StoreError> {
    let row = sqlx::query(
        r#"INSERT INTO transfers (from_card_id, to_card_id, amount, note)
           VALUES ($1, $2, $3, $4)
           RETURNING id, from_card_id, to_card_id, amount, note, created_at"#,
    )
    .bind(record.from_account)
    .bind(record.to_account)
    .bind(record.amount)
    .bind(record.note.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    row_to_record(&row)
}

/// Lock one card row for the rest of the transaction
async fn lock_card(conn: &mut PgConnection, id: CardId) -> Result<Option<LockedCard>, StoreError> {
    let row = sqlx::query("SELECT is_blocked, balance FROM cards WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| {
        Ok(LockedCard {
            blocked: r.try_get("is_blocked")?,
            balance: r.try_get("balance")?,
        })
    })
    .transpose()
}

struct LockedCard {
    blocked: bool,
    balance: Decimal,
}

// ============================================================================
// Contracts
// ============================================================================

#[async_trait]
impl AccountStore for PgStore {
    async fn lookup_by_number(&self, card_number: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, owner_id, card_number, card_type, balance, is_blocked, created_at
               FROM cards WHERE card_number = $1"#,
        )
        .bind(card_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn get(&self, id: CardId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, owner_id, card_number, card_type, balance, is_blocked, created_at
               FROM cards WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn adjust_balance(&self, id: CardId, delta: Decimal) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        apply_delta(&mut conn, id, delta).await
    }

    async fn is_blocked(&self, id: CardId) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT is_blocked FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn toggle_block(&self, id: CardId) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE cards SET is_blocked = NOT is_blocked WHERE id = $1 RETURNING is_blocked",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn ensure_owner(&self, phone: &str) -> Result<UserId, StoreError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(StoreError::InvalidRecord("phone must not be empty".into()));
        }

        // DO UPDATE (not DO NOTHING) so RETURNING yields the existing row
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO users (phone) VALUES ($1)
               ON CONFLICT (phone) DO UPDATE SET phone = EXCLUDED.phone
               RETURNING id"#,
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn issue_card(
        &self,
        owner: UserId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_card(&mut conn, owner, card_number, card_type).await
    }

    async fn cards_of(&self, owner: UserId) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, owner_id, card_number, card_type, balance, is_blocked, created_at
               FROM cards WHERE owner_id = $1 ORDER BY id"#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    async fn request_card(&self, owner: UserId) -> Result<CardRequest, StoreError> {
        // Unknown owner trips the foreign key (23503 -> NotFound)
        let row = sqlx::query(
            r#"INSERT INTO card_requests (owner_id, status)
               VALUES ($1, 'pending')
               RETURNING id, owner_id, status, created_at, processed_at"#,
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        row_to_request(&row)
    }

    async fn pending_requests(&self) -> Result<Vec<CardRequest>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, owner_id, status, created_at, processed_at
               FROM card_requests WHERE status = 'pending'
               ORDER BY id DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn approve_request(
        &self,
        request_id: RequestId,
        card_number: &str,
        card_type: CardType,
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock so two operators cannot approve the same request twice
        let owner = sqlx::query_scalar::<_, i64>(
            "SELECT owner_id FROM card_requests WHERE id = $1 AND status = 'pending' FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let card = insert_card(&mut tx, owner, card_number, card_type).await?;

        sqlx::query(
            "UPDATE card_requests SET status = 'approved', processed_at = NOW() WHERE id = $1",
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(card)
    }
}

#[async_trait]
impl Ledger for PgStore {
    async fn append(&self, record: NewTransfer) -> Result<TransferRecord, StoreError> {
        record.validate()?;
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, &record).await
    }

    async fn record(&self, id: RecordId) -> Result<Option<TransferRecord>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, from_card_id, to_card_id, amount, note, created_at
               FROM transfers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn history(
        &self,
        account: CardId,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, from_card_id, to_card_id, amount, note, created_at
               FROM transfers
               WHERE from_card_id = $1 OR to_card_id = $1
               ORDER BY id DESC
               LIMIT $2"#,
        )
        .bind(account)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl TransferStore for PgStore {
    async fn commit_transfer(
        &self,
        transfer: &NewTransfer,
        lock_timeout: Duration,
    ) -> Result<TransferRecord, CommitError> {
        transfer.validate()?;

        let mut tx = self.pool.begin().await?;

        // Scoped to this transaction; a lock wait past it fails with 55P03
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", lock_timeout.as_millis().max(1)))
            .execute(&mut *tx)
            .await?;

        // Ascending id order: two opposite transfers cannot deadlock
        let from = transfer.from_account;
        let to = transfer.to_account;
        let (source, destination) = if from < to {
            let s = lock_card(&mut tx, from).await?;
            let d = lock_card(&mut tx, to).await?;
            (s, d)
        } else {
            let d = lock_card(&mut tx, to).await?;
            let s = lock_card(&mut tx, from).await?;
            (s, d)
        };

        let source = source.ok_or(CommitError::at_source(StoreError::NotFound))?;
        if source.blocked {
            return Err(CommitError::at_source(StoreError::Blocked));
        }
        if source.balance < transfer.amount {
            return Err(CommitError::at_source(StoreError::InsufficientFunds));
        }

        let destination = destination.ok_or(CommitError::at_destination(StoreError::NotFound))?;
        if destination.blocked {
            return Err(CommitError::at_destination(StoreError::Blocked));
        }

        apply_delta(&mut tx, from, -transfer.amount)
            .await
            .map_err(CommitError::at_source)?;
        apply_delta(&mut tx, to, transfer.amount)
            .await
            .map_err(CommitError::at_destination)?;
        let record = insert_record(&mut tx, transfer).await?;

        tx.commit().await?;

        tracing::debug!(
            record_id = record.id,
            from = from,
            to = to,
            "Transfer committed"
        );
        Ok(record)
    }
}
