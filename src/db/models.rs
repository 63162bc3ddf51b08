use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

macro_rules! text_enum {
    ($name:ident, $table:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(LedgerError::corrupt(
                        $table,
                        format!("unknown {} '{}'", stringify!($name), other),
                    )),
                }
            }
        }
    };
}

text_enum!(CardStatus, "cards", {
    Active => "ACTIVE",
    Blocked => "BLOCKED",
    Expired => "EXPIRED",
});

text_enum!(TransactionType, "card_transactions", {
    Deposit => "DEPOSIT",
    Withdraw => "WITHDRAW",
});

text_enum!(TransferStatus, "transfers", {
    Pending => "PENDING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

text_enum!(BlockRequestStatus, "block_requests", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

impl BlockRequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// === Rows, exactly as stored ===

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardRow {
    pub id: i64,
    pub owner_id: i64,
    pub encrypted_number: String,
    pub number_index: String,
    pub expiry_date: NaiveDate,
    pub balance: String,
    pub status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub card_id: i64,
    pub transaction_type: String,
    pub amount: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransferRow {
    pub id: i64,
    pub from_card_id: i64,
    pub to_card_id: i64,
    pub amount: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockRequestRow {
    pub id: i64,
    pub card_id: i64,
    pub user_id: i64,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// === Domain records handed to callers ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            created_at: row.created_at,
        }
    }
}

/// A card as seen by callers. The clear number never leaves the codec;
/// only its masked form is carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub owner_id: i64,
    pub masked_number: String,
    #[serde(skip)]
    pub encrypted_number: String,
    pub expiry_date: NaiveDate,
    pub balance: Decimal,
    pub status: CardStatus,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub card_id: i64,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            card_id: row.card_id,
            transaction_type: row.transaction_type.parse()?,
            amount: crate::money::from_column("card_transactions", &row.amount)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: i64,
    pub from_card_id: i64,
    pub to_card_id: i64,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for TransferRecord {
    type Error = LedgerError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            from_card_id: row.from_card_id,
            to_card_id: row.to_card_id,
            amount: crate::money::from_column("transfers", &row.amount)?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub id: i64,
    pub card_id: i64,
    pub user_id: i64,
    pub status: BlockRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BlockRequestRow> for BlockRequest {
    type Error = LedgerError;

    fn try_from(row: BlockRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            card_id: row.card_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            requested_at: row.requested_at,
            processed_at: row.processed_at,
        })
    }
}

/// Input for issuing a new card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    pub owner_id: i64,
    pub number: String,
    pub expiry_date: NaiveDate,
    pub initial_balance: Decimal,
}
