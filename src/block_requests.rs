use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::accounts::AccountStore;
use crate::db::models::{BlockRequest, BlockRequestRow, BlockRequestStatus};
use crate::db::queries;
use crate::error::{LedgerError, Result, is_unique_violation};
use crate::locks::CardLocks;
use crate::validation::validate_date_range;

#[derive(Debug, Clone, Default)]
pub struct BlockRequestFilter {
    pub user_id: Option<i64>,
    pub card_id: Option<i64>,
    pub status: Option<BlockRequestStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Lifecycle of a user's request to freeze a card.
///
/// `PENDING -> APPROVED | REJECTED`. A card gets at most one request for
/// its whole lifetime, whatever became of the earlier one.
#[derive(Clone)]
pub struct BlockRequestWorkflow {
    pool: SqlitePool,
    accounts: AccountStore,
    locks: CardLocks,
}

impl BlockRequestWorkflow {
    pub fn new(pool: SqlitePool, accounts: AccountStore, locks: CardLocks) -> Self {
        Self {
            pool,
            accounts,
            locks,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, card_id: i64, user_id: i64) -> Result<BlockRequest> {
        let _guard = self.locks.acquire(&[card_id]).await;
        self.accounts.get_by_id(card_id).await?;
        if queries::get_user(&self.pool, user_id).await?.is_none() {
            return Err(LedgerError::not_found("User", user_id));
        }

        if queries::block_request_exists_for_card(&self.pool, card_id).await? {
            tracing::warn!("duplicate block request rejected");
            return Err(LedgerError::DuplicateRequest(card_id));
        }

        let id = queries::insert_block_request(&self.pool, card_id, user_id, Utc::now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LedgerError::DuplicateRequest(card_id)
                } else {
                    e.into()
                }
            })?;

        tracing::info!(request_id = id, "block request submitted");
        self.get(id).await
    }

    /// Blocks the card and marks the request APPROVED in one unit of work.
    #[tracing::instrument(skip(self))]
    pub async fn approve(&self, request_id: i64) -> Result<BlockRequest> {
        let request = self.get(request_id).await?;
        let _guard = self.locks.acquire(&[request.card_id]).await;
        // re-read under the lock
        let request = self.get(request_id).await?;
        if request.status.is_terminal() {
            return Err(LedgerError::AlreadyProcessed(request_id));
        }
        let card = self.accounts.get_by_id(request.card_id).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let resolved =
            queries::resolve_block_request(&mut *tx, request_id, BlockRequestStatus::Approved, now)
                .await?;
        if !resolved {
            return Err(LedgerError::AlreadyProcessed(request_id));
        }
        AccountStore::block_in(&mut tx, &card, now).await?;
        tx.commit().await?;

        tracing::info!(card_id = card.id, "block request approved, card blocked");
        self.get(request_id).await
    }

    /// Closes the request without touching the card.
    #[tracing::instrument(skip(self))]
    pub async fn reject(&self, request_id: i64) -> Result<BlockRequest> {
        let request = self.get(request_id).await?;
        let _guard = self.locks.acquire(&[request.card_id]).await;

        let resolved = queries::resolve_block_request(
            &self.pool,
            request_id,
            BlockRequestStatus::Rejected,
            Utc::now(),
        )
        .await?;
        if !resolved {
            return Err(LedgerError::AlreadyProcessed(request_id));
        }

        tracing::info!("block request rejected");
        self.get(request_id).await
    }

    pub async fn get(&self, request_id: i64) -> Result<BlockRequest> {
        queries::get_block_request(&self.pool, request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("BlockRequest", request_id))?
            .try_into()
    }

    /// Newest first.
    pub async fn list(&self, filter: &BlockRequestFilter) -> Result<Vec<BlockRequest>> {
        validate_date_range(filter.from.as_ref(), filter.to.as_ref())?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM block_requests WHERE 1 = 1");
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(card_id) = filter.card_id {
            qb.push(" AND card_id = ").push_bind(card_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND requested_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND requested_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY id DESC");

        let rows = qb
            .build_query_as::<BlockRequestRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BlockRequest::try_from).collect()
    }
}
