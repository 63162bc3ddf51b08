use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::accounts::{AccountStore, CardFilter};
use crate::block_requests::{BlockRequestFilter, BlockRequestWorkflow};
use crate::crypto::{CardNumberCodec, EncryptionKey};
use crate::db::models::{BlockRequest, Card, NewCard, TransactionRecord, TransferRecord, User};
use crate::error::Result;
use crate::history::{HistoryRecorder, TransactionFilter, TransferFilter};
use crate::ledger::LedgerEngine;
use crate::locks::CardLocks;
use crate::users::UserRegistry;

/// Entry point for callers of the ledger core.
///
/// All components share one pool and one lock registry, so a `Bank` (or any
/// clone of it) serializes operations on the same card.
#[derive(Clone)]
pub struct Bank {
    users: UserRegistry,
    accounts: AccountStore,
    ledger: LedgerEngine,
    block_requests: BlockRequestWorkflow,
    history: HistoryRecorder,
}

impl Bank {
    pub fn new(pool: SqlitePool, key: &EncryptionKey) -> Result<Self> {
        let codec = CardNumberCodec::new(key)?;
        let locks = CardLocks::new();
        let accounts = AccountStore::new(pool.clone(), codec, locks.clone());

        Ok(Self {
            users: UserRegistry::new(pool.clone()),
            ledger: LedgerEngine::new(pool.clone(), accounts.clone(), locks.clone()),
            block_requests: BlockRequestWorkflow::new(pool.clone(), accounts.clone(), locks),
            history: HistoryRecorder::new(pool),
            accounts,
        })
    }

    /// Direct access to the card store, for balance adjustments outside the
    /// deposit and withdrawal flow.
    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    // Money movement

    pub async fn deposit(&self, card_id: i64, amount: Decimal) -> Result<TransactionRecord> {
        self.ledger.deposit(card_id, amount).await
    }

    pub async fn withdraw(&self, card_id: i64, amount: Decimal) -> Result<TransactionRecord> {
        self.ledger.withdraw(card_id, amount).await
    }

    pub async fn transfer(
        &self,
        from_card_id: i64,
        to_card_id: i64,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        self.ledger.transfer(from_card_id, to_card_id, amount).await
    }

    // Cards

    pub async fn create_card(
        &self,
        owner_id: i64,
        number: &str,
        expiry_date: NaiveDate,
        initial_balance: Decimal,
    ) -> Result<Card> {
        self.accounts
            .create(NewCard {
                owner_id,
                number: number.to_string(),
                expiry_date,
                initial_balance,
            })
            .await
    }

    pub async fn block_card(&self, card_id: i64) -> Result<Card> {
        self.accounts.block(card_id).await
    }

    pub async fn activate_card(&self, card_id: i64) -> Result<Card> {
        self.accounts.activate(card_id).await
    }

    pub async fn activate_card_on(&self, card_id: i64, today: NaiveDate) -> Result<Card> {
        self.accounts.activate_on(card_id, today).await
    }

    pub async fn get_card(&self, card_id: i64) -> Result<Card> {
        self.accounts.get_by_id(card_id).await
    }

    pub async fn get_card_by_number(&self, number: &str) -> Result<Card> {
        self.accounts.get_by_number(number).await
    }

    pub async fn reveal_card_number(&self, card_id: i64) -> Result<String> {
        self.accounts.reveal_number(card_id).await
    }

    pub async fn sum_balance(&self, owner_id: i64) -> Result<Decimal> {
        self.accounts.sum_balance(owner_id).await
    }

    pub async fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>> {
        self.accounts.list(filter).await
    }

    // Block requests

    pub async fn submit_block_request(&self, card_id: i64, user_id: i64) -> Result<BlockRequest> {
        self.block_requests.submit(card_id, user_id).await
    }

    pub async fn approve_block_request(&self, request_id: i64) -> Result<BlockRequest> {
        self.block_requests.approve(request_id).await
    }

    pub async fn reject_block_request(&self, request_id: i64) -> Result<BlockRequest> {
        self.block_requests.reject(request_id).await
    }

    pub async fn get_block_request(&self, request_id: i64) -> Result<BlockRequest> {
        self.block_requests.get(request_id).await
    }

    pub async fn block_requests(&self, filter: &BlockRequestFilter) -> Result<Vec<BlockRequest>> {
        self.block_requests.list(filter).await
    }

    // Users

    pub async fn create_user(&self, username: &str) -> Result<User> {
        self.users.create(username).await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.users.get(user_id).await
    }

    // History

    pub async fn get_transaction(&self, id: i64) -> Result<TransactionRecord> {
        self.history.transaction(id).await
    }

    pub async fn get_transfer(&self, id: i64) -> Result<TransferRecord> {
        self.history.transfer(id).await
    }

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        self.history.transactions(filter).await
    }

    pub async fn transfers(&self, filter: &TransferFilter) -> Result<Vec<TransferRecord>> {
        self.history.transfers(filter).await
    }
}
