use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::accounts::AccountStore;
use crate::db::models::{TransactionRecord, TransactionType, TransferRecord, TransferStatus};
use crate::error::{LedgerError, Result};
use crate::history::HistoryRecorder;
use crate::locks::CardLocks;
use crate::money::Amount;

/// Applies deposits, withdrawals and transfers to card balances.
///
/// Each operation is a single unit of work: the affected cards are locked
/// in ascending id order, read, checked, and then every write plus the
/// history record commit together or not at all.
#[derive(Clone)]
pub struct LedgerEngine {
    pool: SqlitePool,
    accounts: AccountStore,
    locks: CardLocks,
}

impl LedgerEngine {
    pub fn new(pool: SqlitePool, accounts: AccountStore, locks: CardLocks) -> Self {
        Self {
            pool,
            accounts,
            locks,
        }
    }

    /// Credits a card. Card status is not checked: blocked cards still accept deposits.
    #[tracing::instrument(skip(self))]
    pub async fn deposit(&self, card_id: i64, amount: Decimal) -> Result<TransactionRecord> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(&[card_id]).await;
        let card = self.accounts.get_by_id(card_id).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let card = AccountStore::write_delta(&mut tx, &card, amount.value(), now).await?;
        let record = HistoryRecorder::record_transaction(
            &mut tx,
            card_id,
            TransactionType::Deposit,
            amount,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(transaction_id = record.id, balance = %card.balance, "deposit committed");
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    pub async fn withdraw(&self, card_id: i64, amount: Decimal) -> Result<TransactionRecord> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(&[card_id]).await;
        let card = self.accounts.get_by_id(card_id).await?;

        if !card.is_active() {
            tracing::warn!(status = %card.status, "withdrawal from inactive card rejected");
            return Err(LedgerError::CardNotActive(card_id));
        }
        if card.balance < amount.value() {
            tracing::warn!(balance = %card.balance, "withdrawal rejected: insufficient funds");
            return Err(LedgerError::InsufficientFunds);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let card = AccountStore::write_delta(&mut tx, &card, -amount.value(), now).await?;
        let record = HistoryRecorder::record_transaction(
            &mut tx,
            card_id,
            TransactionType::Withdraw,
            amount,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(transaction_id = record.id, balance = %card.balance, "withdrawal committed");
        Ok(record)
    }

    /// Moves `amount` between two distinct active cards. Both balance writes
    /// and the transfer record share one database transaction.
    #[tracing::instrument(skip(self))]
    pub async fn transfer(
        &self,
        from_card_id: i64,
        to_card_id: i64,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        if from_card_id == to_card_id {
            return Err(LedgerError::SameCardTransfer);
        }
        let amount = Amount::new(amount)?;

        let _guard = self.locks.acquire(&[from_card_id, to_card_id]).await;
        let from = self.accounts.get_by_id(from_card_id).await?;
        let to = self.accounts.get_by_id(to_card_id).await?;

        for card in [&from, &to] {
            if !card.is_active() {
                tracing::warn!(card_id = card.id, status = %card.status, "transfer rejected: card not active");
                return Err(LedgerError::CardNotActive(card.id));
            }
        }
        if from.balance < amount.value() {
            tracing::warn!(balance = %from.balance, "transfer rejected: insufficient funds");
            return Err(LedgerError::InsufficientFunds);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        // Write in id order, matching the lock order.
        let (first, first_delta, second, second_delta) = if from.id < to.id {
            (&from, -amount.value(), &to, amount.value())
        } else {
            (&to, amount.value(), &from, -amount.value())
        };
        AccountStore::write_delta(&mut tx, first, first_delta, now).await?;
        AccountStore::write_delta(&mut tx, second, second_delta, now).await?;
        let record = HistoryRecorder::record_transfer(
            &mut tx,
            from_card_id,
            to_card_id,
            amount,
            TransferStatus::Completed,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(transfer_id = record.id, "transfer committed");
        Ok(record)
    }
}
