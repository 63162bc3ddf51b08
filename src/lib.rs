//! Card ledger core: card balances, deposits, withdrawals, transfers,
//! card blocking and the audit trail behind them, on SQLite.

pub mod accounts;
pub mod bank;
pub mod block_requests;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod history;
pub mod ledger;
pub mod locks;
pub mod money;
pub mod users;
pub mod validation;

pub use accounts::CardFilter;
pub use bank::Bank;
pub use block_requests::BlockRequestFilter;
pub use crypto::{CardNumberCodec, EncryptionKey, mask};
pub use db::models::{
    BlockRequest, BlockRequestStatus, Card, CardStatus, NewCard, TransactionRecord,
    TransactionType, TransferRecord, TransferStatus, User,
};
pub use db::{PoolSettings, init_pool};
pub use error::{ErrorKind, LedgerError, Result};
pub use history::{TransactionFilter, TransferFilter};
pub use money::Amount;
