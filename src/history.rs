//! Append-only audit trail of deposits, withdrawals and transfers.
//!
//! Records are only ever written from inside a ledger unit of work and
//! there is no way to update or delete one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::db::models::{
    TransactionRecord, TransactionRow, TransactionType, TransferRecord, TransferRow,
    TransferStatus,
};
use crate::db::queries;
use crate::error::{LedgerError, Result};
use crate::money::{self, Amount};
use crate::validation::validate_date_range;

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<i64>,
    pub card_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// A transfer matches `user_id` or `card_id` when either side does.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub user_id: Option<i64>,
    pub card_id: Option<i64>,
    pub status: Option<TransferStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

#[derive(Clone)]
pub struct HistoryRecorder {
    pool: SqlitePool,
}

impl HistoryRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn record_transaction(
        conn: &mut SqliteConnection,
        card_id: i64,
        transaction_type: TransactionType,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let id = queries::insert_transaction(
            conn,
            card_id,
            transaction_type,
            &money::to_column(amount.value()),
            now,
        )
        .await?;

        Ok(TransactionRecord {
            id,
            card_id,
            transaction_type,
            amount: amount.value(),
            created_at: now,
        })
    }

    pub(crate) async fn record_transfer(
        conn: &mut SqliteConnection,
        from_card_id: i64,
        to_card_id: i64,
        amount: Amount,
        status: TransferStatus,
        now: DateTime<Utc>,
    ) -> Result<TransferRecord> {
        let id = queries::insert_transfer(
            conn,
            from_card_id,
            to_card_id,
            &money::to_column(amount.value()),
            status,
            now,
        )
        .await?;

        Ok(TransferRecord {
            id,
            from_card_id,
            to_card_id,
            amount: amount.value(),
            status,
            created_at: now,
        })
    }

    pub async fn transaction(&self, id: i64) -> Result<TransactionRecord> {
        queries::get_transaction(&self.pool, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Transaction", id))?
            .try_into()
    }

    pub async fn transfer(&self, id: i64) -> Result<TransferRecord> {
        queries::get_transfer(&self.pool, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Transfer", id))?
            .try_into()
    }

    /// Newest first.
    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        validate_date_range(filter.from.as_ref(), filter.to.as_ref())?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT t.* FROM card_transactions t JOIN cards c ON c.id = t.card_id WHERE 1 = 1",
        );
        if let Some(user_id) = filter.user_id {
            qb.push(" AND c.owner_id = ").push_bind(user_id);
        }
        if let Some(card_id) = filter.card_id {
            qb.push(" AND t.card_id = ").push_bind(card_id);
        }
        if let Some(transaction_type) = filter.transaction_type {
            qb.push(" AND t.transaction_type = ")
                .push_bind(transaction_type.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND t.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND t.created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY t.id DESC");

        let rows = qb
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    /// Newest first. Amount bounds are applied after decoding, since
    /// amounts are stored as text.
    pub async fn transfers(&self, filter: &TransferFilter) -> Result<Vec<TransferRecord>> {
        validate_date_range(filter.from.as_ref(), filter.to.as_ref())?;
        validate_amount_range(filter.min_amount, filter.max_amount)?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT t.* FROM transfers t
             JOIN cards f ON f.id = t.from_card_id
             JOIN cards d ON d.id = t.to_card_id
             WHERE 1 = 1",
        );
        if let Some(user_id) = filter.user_id {
            qb.push(" AND (f.owner_id = ")
                .push_bind(user_id)
                .push(" OR d.owner_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(card_id) = filter.card_id {
            qb.push(" AND (t.from_card_id = ")
                .push_bind(card_id)
                .push(" OR t.to_card_id = ")
                .push_bind(card_id)
                .push(")");
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND t.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND t.created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY t.id DESC");

        let rows = qb
            .build_query_as::<TransferRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = TransferRecord::try_from(row)?;
            let above_min = filter.min_amount.is_none_or(|min| record.amount >= min);
            let below_max = filter.max_amount.is_none_or(|max| record.amount <= max);
            if above_min && below_max {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn validate_amount_range(min: Option<Decimal>, max: Option<Decimal>) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(LedgerError::InvalidAmount(format!("{min} > {max}")));
    }
    Ok(())
}
