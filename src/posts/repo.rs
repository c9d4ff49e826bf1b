use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::model::{NewPost, Post, PostFilter, POST_COLUMNS};
use crate::{
    db::timed,
    error::StoreError,
    filters::{calculate_metadata, Filters, Metadata},
    query::{bind_query_as, bind_query_scalar, order_clause, WhereBuilder},
};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: &NewPost) -> Result<Post, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError>;

    /// Writes `post` if its stored version still equals `post.version`, and
    /// returns it with the incremented version.
    async fn update(&self, post: &Post) -> Result<Post, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Counts every match, then fetches the requested page.
    async fn list(
        &self,
        filter: &PostFilter,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata), StoreError>;
}

#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgPostStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn insert(&self, post: &NewPost) -> Result<Post, StoreError> {
        let sql = format!(
            "INSERT INTO posts (name, description, author_id, type, skills) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {POST_COLUMNS}"
        );
        timed(
            self.timeout,
            sqlx::query_as::<_, Post>(&sql)
                .bind(&post.name)
                .bind(&post.description)
                .bind(post.author_id)
                .bind(&post.kind)
                .bind(&post.skills)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        timed(
            self.timeout,
            sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        let version = timed(
            self.timeout,
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE posts
                SET name = $1, description = $2, type = $3, skills = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&post.name)
            .bind(&post.description)
            .bind(&post.kind)
            .bind(&post.skills)
            .bind(post.id)
            .bind(post.version)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(StoreError::Conflict)?;

        Ok(Post {
            version,
            ..post.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let result = timed(
            self.timeout,
            sqlx::query("DELETE FROM posts WHERE id = $1")
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
        filter: &PostFilter,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata), StoreError> {
        let mut w = WhereBuilder::new();
        w.ilike("name", &filter.name)
            .ilike("description", &filter.description)
            .eq_int("author_id", filter.author_id)
            .eq_text("type", &filter.kind)
            .contains_all("skills", &filter.skills);
        let where_clause = w.where_clause();

        let count_sql = format!("SELECT count(*) FROM posts {where_clause}");
        let total = timed(
            self.timeout,
            bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), w.binds())
                .fetch_one(&self.pool),
        )
        .await?;

        let idx = w.next_index();
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts {where_clause} {} LIMIT ${idx} OFFSET ${}",
            order_clause(filters),
            idx + 1
        );
        let posts = timed(
            self.timeout,
            bind_query_as(sqlx::query_as::<_, Post>(&sql), w.binds())
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool),
        )
        .await?;

        Ok((posts, calculate_metadata(total, filters.page, filters.page_size)))
    }
}
