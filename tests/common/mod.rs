#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use cardledger::{Bank, Card, EncryptionKey, PoolSettings, User, init_pool};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

pub const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

static NEXT_NUMBER: AtomicU64 = AtomicU64::new(1);

/// A bank backed by a fresh database file. The directory is removed when
/// this is dropped, so keep it alive for the whole test.
pub struct TestBank {
    pub bank: Bank,
    url: String,
    _dir: TempDir,
}

impl TestBank {
    /// Another bank on the same database file with its own pool and lock
    /// registry, standing in for a second process.
    pub async fn open_another(&self) -> Bank {
        let pool = init_pool(&PoolSettings::new(self.url.clone()))
            .await
            .unwrap();
        Bank::new(pool, &EncryptionKey::from_hex(TEST_KEY).unwrap()).unwrap()
    }
}

impl std::ops::Deref for TestBank {
    type Target = Bank;

    fn deref(&self) -> &Bank {
        &self.bank
    }
}

pub async fn setup() -> TestBank {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let pool = init_pool(&PoolSettings::new(url.clone())).await.unwrap();
    let key = EncryptionKey::from_hex(TEST_KEY).unwrap();
    let bank = Bank::new(pool, &key).unwrap();
    TestBank {
        bank,
        url,
        _dir: dir,
    }
}

/// A syntactically valid 16 digit number not handed out before in this process.
pub fn unique_number() -> String {
    format!("4000{:012}", NEXT_NUMBER.fetch_add(1, Ordering::Relaxed))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn next_year() -> NaiveDate {
    today().checked_add_days(Days::new(365)).unwrap()
}

pub async fn user(bank: &Bank, name: &str) -> User {
    bank.create_user(name).await.unwrap()
}

pub async fn card(bank: &Bank, owner: &User, balance: Decimal) -> Card {
    bank.create_card(owner.id, &unique_number(), next_year(), balance)
        .await
        .unwrap()
}
