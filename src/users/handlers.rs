use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{UserListResponse, UserResponse},
    services::{self, ImageUpload, ProfileChanges},
};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/my", get(get_me))
        .route("/users/:id", get(get_user).delete(delete_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users/update", patch(update_profile))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(qs): Query<HashMap<String, String>>,
) -> AppResult<Json<UserListResponse>> {
    let (users, metadata) = services::list_users(&state, &qs).await?;
    Ok(Json(UserListResponse { users, metadata }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = services::get_user(&state, user_id).await?;
    Ok(Json(UserResponse { user }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = services::get_user(&state, id).await?;
    Ok(Json(UserResponse { user }))
}

/// PATCH /users/update (multipart)
/// Text fields: name, surname, username, telegram, discord, skills (repeated
/// or comma-separated). File field: profileImage.
#[instrument(skip(state, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let mut changes = ProfileChanges::default();
    let mut image = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "profileImage" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_multipart)?;
                if !body.is_empty() {
                    image = Some(ImageUpload { body, content_type });
                }
            }
            "skills" | "skills[]" => {
                let text = field.text().await.map_err(bad_multipart)?;
                changes
                    .skills
                    .get_or_insert_with(Vec::new)
                    .extend(text.split(',').map(str::to_string));
            }
            "name" | "surname" | "username" | "telegram" | "discord" => {
                let text = field.text().await.map_err(bad_multipart)?;
                let slot = match name.as_str() {
                    "name" => &mut changes.name,
                    "surname" => &mut changes.surname,
                    "username" => &mut changes.username,
                    "telegram" => &mut changes.telegram,
                    _ => &mut changes.discord,
                };
                *slot = Some(text);
            }
            _ => {}
        }
    }

    let user = services::update_profile(&state, user_id, changes, image).await?;
    Ok((StatusCode::ACCEPTED, Json(UserResponse { user })))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete_user(&state, caller_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!(error = %e, "invalid multipart body");
    AppError::BadRequest(format!("invalid multipart body: {e}"))
}
