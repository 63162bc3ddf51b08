use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::crypto::{CardNumberCodec, mask};
use crate::db::models::{Card, CardRow, CardStatus, NewCard};
use crate::db::queries;
use crate::error::{LedgerError, Result, is_unique_violation};
use crate::locks::CardLocks;
use crate::money::{self, Amount};
use crate::validation::{validate_card_number, validate_expiry};

/// Optional constraints for [`AccountStore::list`].
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    pub owner_id: Option<i64>,
    pub status: Option<CardStatus>,
}

/// Persistent card storage.
///
/// Every balance or status write checks the row version it read, so a
/// concurrent writer the in-process locks cannot see (another process on
/// the same database file) surfaces as [`LedgerError::Conflict`] rather
/// than a lost update.
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
    codec: CardNumberCodec,
    locks: CardLocks,
}

impl AccountStore {
    pub fn new(pool: SqlitePool, codec: CardNumberCodec, locks: CardLocks) -> Self {
        Self { pool, codec, locks }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Card> {
        let row = queries::get_card(&self.pool, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Card", id))?;
        self.hydrate(row)
    }

    /// Looks a card up by its clear number through the keyed index.
    pub async fn get_by_number(&self, number: &str) -> Result<Card> {
        if validate_card_number(number).is_err() {
            return Err(LedgerError::not_found("Card", mask(number)));
        }
        let index = self.codec.number_index(number)?;
        let row = queries::get_card_by_index(&self.pool, &index)
            .await?
            .ok_or_else(|| LedgerError::not_found("Card", mask(number)))?;
        tracing::debug!(card_id = row.id, "card resolved by number");
        self.hydrate(row)
    }

    /// Decrypts the stored number of a card. Callers must not log the result.
    pub async fn reveal_number(&self, id: i64) -> Result<String> {
        let card = self.get_by_id(id).await?;
        self.codec.decode(&card.encrypted_number)
    }

    pub async fn create(&self, new: NewCard) -> Result<Card> {
        self.create_on(new, Utc::now().date_naive()).await
    }

    /// Issues a card as of `today`; the expiry must lie strictly after it.
    pub async fn create_on(&self, new: NewCard, today: NaiveDate) -> Result<Card> {
        validate_card_number(&new.number)?;
        validate_expiry(new.expiry_date, today)?;
        let balance = money::opening_balance(new.initial_balance)?;

        if queries::get_user(&self.pool, new.owner_id).await?.is_none() {
            return Err(LedgerError::not_found("User", new.owner_id));
        }

        let index = self.codec.number_index(&new.number)?;
        if queries::card_number_exists(&self.pool, &index).await? {
            return Err(LedgerError::DuplicateNumber);
        }
        let encrypted = self.codec.encrypt(&new.number)?;

        let id = queries::insert_card(
            &self.pool,
            new.owner_id,
            &encrypted,
            &index,
            new.expiry_date,
            &money::to_column(balance),
            CardStatus::Active,
            Utc::now(),
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateNumber
            } else {
                e.into()
            }
        })?;

        tracing::info!(card_id = id, owner_id = new.owner_id, "card issued");
        self.get_by_id(id).await
    }

    /// Adds `delta` (negative for a debit) to a card's balance as one unit
    /// of work. Fails with `InsufficientFunds` if the result would be negative.
    pub async fn apply_delta(&self, id: i64, delta: Decimal) -> Result<Card> {
        Amount::new(delta.abs())?;
        let _guard = self.locks.acquire(&[id]).await;
        let card = self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;
        let updated = Self::write_delta(&mut tx, &card, delta, Utc::now()).await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn block(&self, id: i64) -> Result<Card> {
        let _guard = self.locks.acquire(&[id]).await;
        let card = self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;
        let updated = Self::block_in(&mut tx, &card, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(card_id = id, "card blocked");
        Ok(updated)
    }

    pub async fn activate(&self, id: i64) -> Result<Card> {
        self.activate_on(id, Utc::now().date_naive()).await
    }

    /// Re-activates a card as of `today`. A card expiring today still qualifies.
    pub async fn activate_on(&self, id: i64, today: NaiveDate) -> Result<Card> {
        let _guard = self.locks.acquire(&[id]).await;
        let card = self.get_by_id(id).await?;

        if card.status == CardStatus::Active {
            return Err(LedgerError::AlreadyActive(id));
        }
        if card.is_expired_on(today) {
            tracing::warn!(card_id = id, expiry = %card.expiry_date, "refusing to activate expired card");
            return Err(LedgerError::CardExpired(id));
        }

        let mut tx = self.pool.begin().await?;
        let updated = Self::write_status(&mut tx, &card, CardStatus::Active, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(card_id = id, "card activated");
        Ok(updated)
    }

    /// Total balance over every card of `owner_id`; zero when there are none.
    pub async fn sum_balance(&self, owner_id: i64) -> Result<Decimal> {
        let balances = queries::owner_balances(&self.pool, owner_id).await?;
        let balances = balances
            .iter()
            .map(|text| money::from_column("cards", text))
            .collect::<Result<Vec<_>>>()?;
        money::checked_total(balances)
    }

    pub async fn list(&self, filter: &CardFilter) -> Result<Vec<Card>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM cards WHERE 1 = 1");
        if let Some(owner_id) = filter.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY id");

        let rows = qb.build_query_as::<CardRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn hydrate(&self, row: CardRow) -> Result<Card> {
        let number = self.codec.decode(&row.encrypted_number)?;
        Ok(Card {
            id: row.id,
            owner_id: row.owner_id,
            masked_number: mask(&number),
            encrypted_number: row.encrypted_number,
            expiry_date: row.expiry_date,
            balance: money::from_column("cards", &row.balance)?,
            status: row.status.parse()?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    // === Unit-of-work primitives. Callers hold the card lock and own `conn`'s transaction. ===

    pub(crate) async fn write_delta(
        conn: &mut SqliteConnection,
        card: &Card,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        let balance = money::checked_balance(card.balance, delta)?;
        if balance < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds);
        }

        let written =
            queries::update_card_balance(conn, card.id, &money::to_column(balance), card.version, now)
                .await?;
        if !written {
            tracing::warn!(card_id = card.id, "stale card version on balance write");
            return Err(LedgerError::Conflict);
        }

        Ok(Card {
            balance,
            version: card.version + 1,
            updated_at: now,
            ..card.clone()
        })
    }

    pub(crate) async fn block_in(
        conn: &mut SqliteConnection,
        card: &Card,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        if card.status == CardStatus::Blocked {
            return Err(LedgerError::AlreadyBlocked(card.id));
        }
        Self::write_status(conn, card, CardStatus::Blocked, now).await
    }

    pub(crate) async fn write_status(
        conn: &mut SqliteConnection,
        card: &Card,
        status: CardStatus,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        let written = queries::update_card_status(conn, card.id, status, card.version, now).await?;
        if !written {
            tracing::warn!(card_id = card.id, "stale card version on status write");
            return Err(LedgerError::Conflict);
        }

        Ok(Card {
            status,
            version: card.version + 1,
            updated_at: now,
            ..card.clone()
        })
    }
}
