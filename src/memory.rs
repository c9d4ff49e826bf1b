//! In-memory stores used by unit and route tests in place of Postgres.
//!
//! Mirrors the SQL behaviour the application relies on: unique email and
//! username, cascading deletes, version-guarded updates, case-insensitive
//! substring filters, array containment and safelisted ordering.

use std::{cmp::Ordering, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    error::StoreError,
    filters::{calculate_metadata, Filters, Metadata},
    posts::{
        model::{NewPost, Post, PostFilter},
        repo::PostStore,
    },
    tokens::{Scope, Token, TokenStore},
    users::{
        model::{User, UserFilter},
        repo::UserStore,
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    tokens: Vec<Token>,
    next_user_id: i64,
    next_post_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn token_count(&self) -> usize {
        self.lock().tokens.len()
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Int(i64),
    Text(String),
    Time(OffsetDateTime),
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn contains_all(have: &[String], want: &[String]) -> bool {
    want.iter().all(|w| have.contains(w))
}

fn sort_rows<T>(
    rows: &mut [T],
    filters: &Filters,
    id: fn(&T) -> i64,
    key: fn(&T, &str) -> SortKey,
) {
    match filters.sort_column() {
        Some(column) => {
            let descending = filters.sort_descending();
            rows.sort_by(|a, b| {
                let ord = key(a, column).cmp(&key(b, column));
                let ord = if descending { ord.reverse() } else { ord };
                match ord {
                    Ordering::Equal => id(a).cmp(&id(b)),
                    other => other,
                }
            });
        }
        None => rows.sort_by_key(id),
    }
}

fn page<T: Clone>(rows: &[T], filters: &Filters) -> Vec<T> {
    rows.iter()
        .skip(filters.offset().max(0) as usize)
        .take(filters.limit().max(0) as usize)
        .cloned()
        .collect()
}

fn check_unique(tables: &Tables, user: &User) -> Result<(), StoreError> {
    let others = tables.users.iter().filter(|u| u.id != user.id);
    for other in others {
        if other.email == user.email {
            return Err(StoreError::DuplicateEmail);
        }
        if other.username == user.username {
            return Err(StoreError::DuplicateUsername);
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &User) -> Result<User, StoreError> {
        let mut t = self.lock();
        let mut stored = user.clone();
        stored.id = 0;
        check_unique(&t, &stored)?;
        t.next_user_id += 1;
        stored.id = t.next_user_id;
        stored.created_at = OffsetDateTime::now_utc();
        stored.version = 1;
        t.users.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        let t = self.lock();
        t.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let t = self.lock();
        t.users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        let t = self.lock();
        let now = OffsetDateTime::now_utc();
        let token = t
            .tokens
            .iter()
            .find(|tok| tok.scope == scope && tok.hash == token_hash && tok.expiry > now)
            .ok_or(StoreError::NotFound)?;
        t.users
            .iter()
            .find(|u| u.id == token.user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut t = self.lock();
        check_unique(&t, user)?;
        let slot = t
            .users
            .iter_mut()
            .find(|u| u.id == user.id && u.version == user.version)
            .ok_or(StoreError::Conflict)?;
        *slot = User {
            created_at: slot.created_at,
            version: user.version + 1,
            ..user.clone()
        };
        Ok(slot.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Err(StoreError::NotFound);
        }
        t.posts.retain(|p| p.author_id != id);
        t.tokens.retain(|tok| tok.user_id != id);
        Ok(())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        filters: &Filters,
    ) -> Result<(Vec<User>, Metadata), StoreError> {
        let t = self.lock();
        let mut rows: Vec<User> = t
            .users
            .iter()
            .filter(|u| contains_ci(&u.name, &filter.name))
            .filter(|u| contains_ci(&u.username, &filter.username))
            .filter(|u| contains_all(&u.skills, &filter.skills))
            .cloned()
            .collect();
        sort_rows(&mut rows, filters, |u| u.id, |u: &User, column: &str| match column {
            "name" => SortKey::Text(u.name.clone()),
            "username" => SortKey::Text(u.username.clone()),
            "created_at" => SortKey::Time(u.created_at),
            _ => SortKey::Int(u.id),
        });
        let total = rows.len() as i64;
        Ok((
            page(&rows, filters),
            calculate_metadata(total, filters.page, filters.page_size),
        ))
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert(&self, post: &NewPost) -> Result<Post, StoreError> {
        let mut t = self.lock();
        if !t.users.iter().any(|u| u.id == post.author_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "insert or update on table \"posts\" violates foreign key constraint".into(),
            )));
        }
        t.next_post_id += 1;
        let stored = Post {
            id: t.next_post_id,
            created_at: OffsetDateTime::now_utc(),
            name: post.name.clone(),
            description: post.description.clone(),
            author_id: post.author_id,
            kind: post.kind.clone(),
            skills: post.skills.clone(),
            version: 1,
        };
        t.posts.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        let t = self.lock();
        t.posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        let mut t = self.lock();
        let slot = t
            .posts
            .iter_mut()
            .find(|p| p.id == post.id && p.version == post.version)
            .ok_or(StoreError::Conflict)?;
        slot.name = post.name.clone();
        slot.description = post.description.clone();
        slot.kind = post.kind.clone();
        slot.skills = post.skills.clone();
        slot.version += 1;
        Ok(slot.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.posts.len();
        t.posts.retain(|p| p.id != id);
        if t.posts.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &PostFilter,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata), StoreError> {
        let t = self.lock();
        let mut rows: Vec<Post> = t
            .posts
            .iter()
            .filter(|p| contains_ci(&p.name, &filter.name))
            .filter(|p| contains_ci(&p.description, &filter.description))
            .filter(|p| filter.author_id.map_or(true, |a| p.author_id == a))
            .filter(|p| filter.kind.is_empty() || p.kind == filter.kind)
            .filter(|p| contains_all(&p.skills, &filter.skills))
            .cloned()
            .collect();
        sort_rows(&mut rows, filters, |p| p.id, |p: &Post, column: &str| match column {
            "name" => SortKey::Text(p.name.clone()),
            "created_at" => SortKey::Time(p.created_at),
            _ => SortKey::Int(p.id),
        });
        let total = rows.len() as i64;
        Ok((
            page(&rows, filters),
            calculate_metadata(total, filters.page, filters.page_size),
        ))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        let mut t = self.lock();
        if !t.users.iter().any(|u| u.id == token.user_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "insert or update on table \"tokens\" violates foreign key constraint".into(),
            )));
        }
        t.tokens.push(token.clone());
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        let mut t = self.lock();
        t.tokens
            .retain(|tok| !(tok.scope == scope && tok.user_id == user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::Credential, posts::model::POST_SORT_SAFELIST};

    fn user(name: &str, email: &str) -> User {
        User::new(
            name.into(),
            name.to_lowercase(),
            email.into(),
            Credential::from_hash("$argon2id$fake".into()),
            String::new(),
        )
    }

    fn new_post(author_id: i64, name: &str, skills: &[&str]) -> NewPost {
        NewPost {
            name: name.into(),
            description: String::new(),
            author_id,
            kind: "project".into(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.into(),
            sort_safelist: POST_SORT_SAFELIST,
        }
    }

    #[tokio::test]
    async fn deleting_user_cascades() {
        let store = MemoryStore::default();
        let author = UserStore::insert(&store, &user("Ann", "a@x.com")).await.unwrap();
        PostStore::insert(&store, &new_post(author.id, "p", &[])).await.unwrap();

        UserStore::delete(&store, author.id).await.unwrap();
        assert_eq!(store.post_count(), 0);
        assert!(matches!(
            UserStore::delete(&store, author.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sorting_descending_by_name() {
        let store = MemoryStore::default();
        let author = UserStore::insert(&store, &user("Ann", "a@x.com")).await.unwrap();
        for name in ["b", "c", "a"] {
            PostStore::insert(&store, &new_post(author.id, name, &[])).await.unwrap();
        }
        let (posts, _) = PostStore::list(&store, &PostFilter::default(), &filters(1, 10, "-name"))
            .await
            .unwrap();
        let names: Vec<_> = posts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["c", "b", "a"]);

        let (posts, _) = PostStore::list(&store, &PostFilter::default(), &filters(1, 10, "bogus"))
            .await
            .unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[tokio::test]
    async fn count_matches_all_pages() {
        let store = MemoryStore::default();
        let author = UserStore::insert(&store, &user("Ann", "a@x.com")).await.unwrap();
        for i in 0..7 {
            let skills: &[&str] = if i % 2 == 0 { &["go"] } else { &["rust"] };
            PostStore::insert(&store, &new_post(author.id, &format!("p{i}"), skills))
                .await
                .unwrap();
        }
        let filter = PostFilter {
            skills: vec!["go".into()],
            ..Default::default()
        };

        let mut seen = 0;
        let mut page_no = 1;
        loop {
            let (posts, meta) = PostStore::list(&store, &filter, &filters(page_no, 3, "name"))
                .await
                .unwrap();
            assert!(posts.len() <= 3);
            assert_eq!(meta.total_records, 4);
            seen += posts.len();
            if page_no >= meta.last_page {
                break;
            }
            page_no += 1;
        }
        assert_eq!(seen, 4);
    }
}
