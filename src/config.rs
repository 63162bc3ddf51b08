use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::time::Duration;

use crate::db::PoolSettings;
use crate::db::models::{BlockRequestStatus, CardStatus, TransactionType, TransferStatus};

#[derive(Parser, Debug, Clone)]
#[command(name = "cardledger")]
#[command(about = "Administrative console for the card ledger")]
#[command(version)]
pub struct Config {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://cardledger.db")]
    pub database_url: String,

    /// 256-bit card number encryption key, hex encoded. Required by every
    /// command except `generate-key`.
    #[arg(long, env = "CARD_ENCRYPTION_KEY", hide_env_values = true)]
    pub card_encryption_key: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: u32,

    /// How long to wait for the database write lock, in milliseconds
    #[arg(long, env = "BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a card owner
    AddUser { username: String },
    /// Issue a card
    CreateCard {
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        number: String,
        /// Expiry date, YYYY-MM-DD
        #[arg(long)]
        expiry: NaiveDate,
        #[arg(long, default_value = "0")]
        balance: Decimal,
    },
    Deposit { card: i64, amount: Decimal },
    Withdraw { card: i64, amount: Decimal },
    Transfer { from: i64, to: i64, amount: Decimal },
    Block { card: i64 },
    Activate { card: i64 },
    /// File a block request on behalf of a user
    RequestBlock { card: i64, user: i64 },
    ApproveBlock { request: i64 },
    RejectBlock { request: i64 },
    /// Show a card (masked)
    Card { id: i64 },
    CardByNumber { number: String },
    /// Total balance over a user's cards
    Balance { user: i64 },
    Cards {
        #[arg(long)]
        owner: Option<i64>,
        #[arg(long)]
        status: Option<CardStatus>,
    },
    Transactions {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        card: Option<i64>,
        #[arg(long = "type")]
        transaction_type: Option<TransactionType>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    Transfers {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        card: Option<i64>,
        #[arg(long)]
        status: Option<TransferStatus>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long)]
        min_amount: Option<Decimal>,
        #[arg(long)]
        max_amount: Option<Decimal>,
    },
    BlockRequests {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        card: Option<i64>,
        #[arg(long)]
        status: Option<BlockRequestStatus>,
    },
    /// Print a freshly generated encryption key and exit
    GenerateKey,
}
