use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::db::queries;
use crate::error::{LedgerError, Result, is_unique_violation};

/// Minimal owner registry so that cards and block requests point at real rows.
#[derive(Clone)]
pub struct UserRegistry {
    pool: SqlitePool,
}

impl UserRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, username: &str) -> Result<User> {
        let id = queries::insert_user(&self.pool, username, Utc::now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LedgerError::DuplicateUser(username.to_string())
                } else {
                    e.into()
                }
            })?;

        tracing::info!(user_id = id, "user registered");
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        queries::get_user(&self.pool, id)
            .await?
            .map(User::from)
            .ok_or_else(|| LedgerError::not_found("User", id))
    }
}
