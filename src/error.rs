use thiserror::Error;

/// Errors returned by every ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Amount must be positive with at most two decimal places: {0}")]
    InvalidAmount(String),

    #[error("Card number must be 16 to 19 digits")]
    InvalidCardNumber,

    #[error("Expiry date {0} is not in the future")]
    InvalidExpiry(chrono::NaiveDate),

    #[error("Start date must be before end date")]
    InvalidDateRange,

    #[error("Balance would exceed the largest storable value")]
    BalanceLimitExceeded,

    #[error("Card with this number already exists")]
    DuplicateNumber,

    #[error("User '{0}' already exists")]
    DuplicateUser(String),

    #[error("Card {0} already has a block request")]
    DuplicateRequest(i64),

    #[error("Card {0} is already blocked")]
    AlreadyBlocked(i64),

    #[error("Card {0} is already active")]
    AlreadyActive(i64),

    #[error("Card {0} is not active")]
    CardNotActive(i64),

    #[error("Block request {0} already processed")]
    AlreadyProcessed(i64),

    #[error("Card {0} has expired")]
    CardExpired(i64),

    #[error("Cannot transfer to the same card")]
    SameCardTransfer,

    #[error("Card number codec error: {0}")]
    Codec(String),

    #[error("Concurrent update conflict, retry the operation")]
    Conflict,

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Coarse classification used by outer layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BusinessRule,
    Conflict,
    Internal,
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn corrupt(table: &'static str, reason: impl ToString) -> Self {
        Self::CorruptRow {
            table,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientFunds
            | Self::InvalidAmount(_)
            | Self::InvalidCardNumber
            | Self::InvalidExpiry(_)
            | Self::InvalidDateRange
            | Self::BalanceLimitExceeded
            | Self::DuplicateNumber
            | Self::DuplicateUser(_)
            | Self::DuplicateRequest(_)
            | Self::AlreadyBlocked(_)
            | Self::AlreadyActive(_)
            | Self::CardNotActive(_)
            | Self::AlreadyProcessed(_)
            | Self::CardExpired(_)
            | Self::SameCardTransfer => ErrorKind::BusinessRule,
            Self::Conflict => ErrorKind::Conflict,
            Self::Codec(_) | Self::CorruptRow { .. } | Self::Database(_) | Self::Migration(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only a concurrency conflict may succeed when the same request is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// SQLITE_BUSY and SQLITE_LOCKED, including their extended variants.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        let contended = match &err {
            sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db) => {
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
            }
            _ => false,
        };

        if contended {
            Self::Conflict
        } else {
            Self::Database(err)
        }
    }
}

/// True when `err` is a UNIQUE constraint failure raised by the database.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
