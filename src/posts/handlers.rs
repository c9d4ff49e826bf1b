use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreatePostRequest, PostListResponse, PostResponse, UpdatePostRequest},
    model::PostChanges,
    services::{self, PostPatch},
};
use crate::{auth::jwt::AuthUser, error::AppResult, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/my", get(list_my_posts))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<PostResponse>)> {
    let post = services::create_post(
        &state,
        user_id,
        PostChanges {
            name: payload.name,
            description: payload.description,
            kind: payload.kind,
            skills: payload.skills,
        },
    )
    .await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v2/posts/{}", post.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(PostResponse { post })))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PostResponse>> {
    let post = services::get_post(&state, id).await?;
    Ok(Json(PostResponse { post }))
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(qs): Query<HashMap<String, String>>,
) -> AppResult<Json<PostListResponse>> {
    let (posts, metadata) = services::list_posts(&state, &qs, None).await?;
    Ok(Json(PostListResponse { posts, metadata }))
}

#[instrument(skip(state))]
pub async fn list_my_posts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(qs): Query<HashMap<String, String>>,
) -> AppResult<Json<PostListResponse>> {
    let (posts, metadata) = services::list_posts(&state, &qs, Some(user_id)).await?;
    Ok(Json(PostListResponse { posts, metadata }))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    let post = services::update_post(
        &state,
        user_id,
        id,
        PostPatch {
            name: payload.name,
            description: payload.description,
            kind: payload.kind,
            skills: payload.skills,
        },
    )
    .await?;
    Ok(Json(PostResponse { post }))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete_post(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
