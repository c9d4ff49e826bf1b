use tracing::{info, warn};

use super::model::{NewPost, Post, PostChanges, PostFilter, POST_SORT_SAFELIST};
use crate::{
    error::{AppError, AppResult},
    filters::{
        read_csv, read_filters, read_optional_int, read_string, validate_filters, Metadata,
        QueryParams,
    },
    state::AppState,
    users::validation::MAX_FIELD_BYTES,
    validator::Validator,
};

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PostPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub skills: Option<Vec<String>>,
}

pub fn validate_post(v: &mut Validator, post: &PostChanges) {
    v.check(!post.name.is_empty(), "name", "must be provided");
    v.check(
        post.name.len() <= MAX_FIELD_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
    v.check(!post.kind.is_empty(), "type", "must be provided");
}

fn clean_skills(skills: Vec<String>) -> Vec<String> {
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize(changes: PostChanges) -> PostChanges {
    PostChanges {
        name: changes.name.trim().to_string(),
        description: changes.description.trim().to_string(),
        kind: changes.kind.trim().to_lowercase(),
        skills: clean_skills(changes.skills),
    }
}

pub async fn create_post(state: &AppState, author_id: i64, input: PostChanges) -> AppResult<Post> {
    let input = normalize(input);
    let mut v = Validator::new();
    validate_post(&mut v, &input);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let post = state
        .posts
        .insert(&NewPost {
            name: input.name,
            description: input.description,
            author_id,
            kind: input.kind,
            skills: input.skills,
        })
        .await?;
    info!(post_id = post.id, author_id, "post created");
    Ok(post)
}

pub async fn get_post(state: &AppState, id: i64) -> AppResult<Post> {
    Ok(state.posts.get_by_id(id).await?)
}

/// Lists posts matching the query string. `author` overrides any `author`
/// parameter, which is how `/posts/my` is served.
pub async fn list_posts(
    state: &AppState,
    qs: &QueryParams,
    author: Option<i64>,
) -> AppResult<(Vec<Post>, Metadata)> {
    let mut v = Validator::new();
    let mut filter = PostFilter {
        name: read_string(qs, "name", ""),
        description: read_string(qs, "description", ""),
        author_id: read_optional_int(qs, "author", &mut v),
        kind: read_string(qs, "type", "").to_lowercase(),
        skills: read_csv(qs, "skills", Vec::new()),
    };
    if author.is_some() {
        filter.author_id = author;
    }
    let filters = read_filters(qs, "created_at", POST_SORT_SAFELIST, &mut v);
    validate_filters(&mut v, &filters);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    Ok(state.posts.list(&filter, &filters).await?)
}

fn ensure_owner(post: &Post, caller_id: i64) -> AppResult<()> {
    if post.author_id != caller_id {
        warn!(post_id = post.id, caller_id, "caller does not own post");
        return Err(AppError::NotOwner("you are not the author of this post"));
    }
    Ok(())
}

pub async fn update_post(
    state: &AppState,
    caller_id: i64,
    id: i64,
    patch: PostPatch,
) -> AppResult<Post> {
    let post = state.posts.get_by_id(id).await?;
    ensure_owner(&post, caller_id)?;

    let changes = normalize(PostChanges {
        name: patch.name.unwrap_or_else(|| post.name.clone()),
        description: patch.description.unwrap_or_else(|| post.description.clone()),
        kind: patch.kind.unwrap_or_else(|| post.kind.clone()),
        skills: patch.skills.unwrap_or_else(|| post.skills.clone()),
    });
    let mut v = Validator::new();
    validate_post(&mut v, &changes);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let post = state
        .posts
        .update(&Post {
            name: changes.name,
            description: changes.description,
            kind: changes.kind,
            skills: changes.skills,
            ..post
        })
        .await?;
    info!(post_id = post.id, version = post.version, "post updated");
    Ok(post)
}

pub async fn delete_post(state: &AppState, caller_id: i64, id: i64) -> AppResult<()> {
    let post = state.posts.get_by_id(id).await?;
    ensure_owner(&post, caller_id)?;
    state.posts.delete(id).await?;
    info!(post_id = id, "post deleted");
    Ok(())
}
