use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::model::{Scope, Token};
use crate::{db::timed, error::StoreError};

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;

    /// Removes every token of `scope` owned by `user_id`. Deleting nothing is
    /// not an error.
    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgTokenStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        timed(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        timed(
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
