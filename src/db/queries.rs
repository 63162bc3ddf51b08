use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Sqlite};

use crate::db::models::{
    BlockRequestRow, BlockRequestStatus, CardRow, CardStatus, TransactionRow, TransactionType,
    TransferRow, TransferStatus, UserRow,
};

pub async fn insert_user<'e, E>(ex: E, username: &str, now: DateTime<Utc>) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO users (username, created_at) VALUES (?, ?)")
        .bind(username)
        .bind(now)
        .execute(ex)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_user<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<UserRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn get_card<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<CardRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, CardRow>("SELECT * FROM cards WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn get_card_by_index<'e, E>(ex: E, number_index: &str) -> sqlx::Result<Option<CardRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, CardRow>("SELECT * FROM cards WHERE number_index = ?")
        .bind(number_index)
        .fetch_optional(ex)
        .await
}

pub async fn card_number_exists<'e, E>(ex: E, number_index: &str) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cards WHERE number_index = ?")
        .bind(number_index)
        .fetch_one(ex)
        .await?;

    Ok(row.0 > 0)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_card<'e, E>(
    ex: E,
    owner_id: i64,
    encrypted_number: &str,
    number_index: &str,
    expiry_date: NaiveDate,
    balance: &str,
    status: CardStatus,
    now: DateTime<Utc>,
) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO cards (owner_id, encrypted_number, number_index, expiry_date,
         balance, status, version, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(owner_id)
    .bind(encrypted_number)
    .bind(number_index)
    .bind(expiry_date)
    .bind(balance)
    .bind(status.as_str())
    .bind(now)
    .bind(now)
    .execute(ex)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Writes a new balance if the row still carries `expected_version`.
/// Returns false when another writer got there first.
pub async fn update_card_balance<'e, E>(
    ex: E,
    card_id: i64,
    balance: &str,
    expected_version: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE cards SET balance = ?, version = version + 1, updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(balance)
    .bind(now)
    .bind(card_id)
    .bind(expected_version)
    .execute(ex)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_card_status<'e, E>(
    ex: E,
    card_id: i64,
    status: CardStatus,
    expected_version: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE cards SET status = ?, version = version + 1, updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(card_id)
    .bind(expected_version)
    .execute(ex)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn owner_balances<'e, E>(ex: E, owner_id: i64) -> sqlx::Result<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String,)> = sqlx::query_as("SELECT balance FROM cards WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_all(ex)
        .await?;

    Ok(rows.into_iter().map(|(balance,)| balance).collect())
}

pub async fn insert_transaction<'e, E>(
    ex: E,
    card_id: i64,
    transaction_type: TransactionType,
    amount: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO card_transactions (card_id, transaction_type, amount, created_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(card_id)
    .bind(transaction_type.as_str())
    .bind(amount)
    .bind(now)
    .execute(ex)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_transaction<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<TransactionRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, TransactionRow>("SELECT * FROM card_transactions WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn insert_transfer<'e, E>(
    ex: E,
    from_card_id: i64,
    to_card_id: i64,
    amount: &str,
    status: TransferStatus,
    now: DateTime<Utc>,
) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO transfers (from_card_id, to_card_id, amount, status, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(from_card_id)
    .bind(to_card_id)
    .bind(amount)
    .bind(status.as_str())
    .bind(now)
    .execute(ex)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_transfer<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<TransferRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, TransferRow>("SELECT * FROM transfers WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn insert_block_request<'e, E>(
    ex: E,
    card_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO block_requests (card_id, user_id, status, requested_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(card_id)
    .bind(user_id)
    .bind(BlockRequestStatus::Pending.as_str())
    .bind(now)
    .execute(ex)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_block_request<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<BlockRequestRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, BlockRequestRow>("SELECT * FROM block_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await
}

pub async fn block_request_exists_for_card<'e, E>(ex: E, card_id: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM block_requests WHERE card_id = ?")
        .bind(card_id)
        .fetch_one(ex)
        .await?;

    Ok(row.0 > 0)
}

/// Moves a PENDING request to a terminal status. Returns false if it was
/// no longer pending.
pub async fn resolve_block_request<'e, E>(
    ex: E,
    id: i64,
    status: BlockRequestStatus,
    now: DateTime<Utc>,
) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE block_requests SET status = ?, processed_at = ?
         WHERE id = ? AND status = 'PENDING'",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;

    Ok(result.rows_affected() > 0)
}
