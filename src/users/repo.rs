use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{User, UserFilter, UserRow, USER_COLUMNS};
use crate::{
    db::timed,
    error::StoreError,
    filters::{calculate_metadata, Filters, Metadata},
    query::{bind_query_as, bind_query_scalar, order_clause, WhereBuilder},
    tokens::Scope,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user and returns it with its generated id, creation
    /// time and version.
    async fn insert(&self, user: &User) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Resolves the owner of an unexpired token of `scope` whose hash is
    /// `token_hash`.
    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError>;

    /// Writes `user` if its stored version still equals `user.version`, and
    /// returns it with the incremented version.
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn list(
        &self,
        filter: &UserFilter,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> Result<User, StoreError> {
        let (id, created_at, version) = timed(
            self.timeout,
            sqlx::query_as::<_, (i64, OffsetDateTime, i32)>(
                r#"
                INSERT INTO users (name, username, email, password_hash, profile_image, activated)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&user.name)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.password.hash())
            .bind(&user.profile_image)
            .bind(user.activated)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(User {
            id,
            created_at,
            version,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT users.id, users.created_at, users.name, users.surname, users.username,
                       users.telegram, users.discord, users.email, users.skills,
                       users.password_hash, users.profile_image, users.activated, users.version
                FROM users
                INNER JOIN tokens ON users.id = tokens.user_id
                WHERE tokens.hash = $1
                  AND tokens.scope = $2
                  AND tokens.expiry > now()
                LIMIT 1
                "#,
            )
            .bind(token_hash)
            .bind(scope.as_str())
            .fetch_optional(&self.pool),
        )
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let version = timed(
            self.timeout,
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET name = $1, surname = $2, username = $3, telegram = $4, discord = $5,
                    email = $6, skills = $7, password_hash = $8, profile_image = $9,
                    activated = $10, version = version + 1
                WHERE id = $11 AND version = $12
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.surname)
            .bind(&user.username)
            .bind(&user.telegram)
            .bind(&user.discord)
            .bind(&user.email)
            .bind(&user.skills)
            .bind(user.password.hash())
            .bind(&user.profile_image)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(StoreError::Conflict)?;

        Ok(User {
            version,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let result = timed(
            self.timeout,
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), StoreError> {
        let mut w = WhereBuilder::new();
        w.ilike("name", &filter.name)
            .ilike("username", &filter.username)
            .contains_all("skills", &filter.skills);
        let where_clause = w.where_clause();

        let count_sql = format!("SELECT count(*) FROM users {where_clause}");
        let total = timed(
            self.timeout,
            bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), w.binds())
                .fetch_one(&self.pool),
        )
        .await?;

        let idx = w.next_index();
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {where_clause} {} LIMIT ${idx} OFFSET ${}",
            order_clause(filters),
            idx + 1
        );
        let rows = timed(
            self.timeout,
            bind_query_as(sqlx::query_as::<_, UserRow>(&sql), w.binds())
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool),
        )
        .await?;

        let users = rows.into_iter().map(User::from).collect();
        Ok((users, calculate_metadata(total, filters.page, filters.page_size)))
    }
}
