use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    model::{User, UserFilter, USER_SORT_SAFELIST},
    validation::validate_profile,
};
use crate::{
    error::{AppError, AppResult},
    filters::{read_csv, read_filters, read_string, validate_filters, Metadata, QueryParams},
    state::AppState,
    storage::{ext_from_mime, key_from_url, profile_image_key, public_url},
    validator::Validator,
};

/// Client-settable profile fields. `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub telegram: Option<String>,
    pub discord: Option<String>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

pub async fn get_user(state: &AppState, id: i64) -> AppResult<User> {
    Ok(state.users.get_by_id(id).await?)
}

pub async fn list_users(state: &AppState, qs: &QueryParams) -> AppResult<(Vec<User>, Metadata)> {
    let mut v = Validator::new();
    let filter = UserFilter {
        name: read_string(qs, "name", ""),
        username: read_string(qs, "username", ""),
        skills: read_csv(qs, "skills", Vec::new()),
    };
    let filters = read_filters(qs, "id", USER_SORT_SAFELIST, &mut v);
    validate_filters(&mut v, &filters);
    if !v.valid() {
        return Err(AppError::validation(v));
    }
    Ok(state.users.list(&filter, &filters).await?)
}

fn apply_changes(user: &mut User, changes: ProfileChanges) {
    if let Some(name) = changes.name {
        user.name = name.trim().to_string();
    }
    if let Some(surname) = changes.surname {
        user.surname = surname.trim().to_string();
    }
    if let Some(username) = changes.username {
        user.username = username.trim().to_string();
    }
    if let Some(telegram) = changes.telegram {
        user.telegram = telegram.trim().to_string();
    }
    if let Some(discord) = changes.discord {
        user.discord = discord.trim().to_string();
    }
    if let Some(skills) = changes.skills {
        user.skills = skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

/// Stored profile images that were uploaded by the user, as opposed to the
/// shared default picture or an external link.
fn owned_image_key<'a>(state: &AppState, url: &'a str) -> Option<&'a str> {
    if url == state.config.default_profile_image {
        return None;
    }
    key_from_url(&state.config.s3.public_url, url)
}

pub async fn update_profile(
    state: &AppState,
    user_id: i64,
    changes: ProfileChanges,
    image: Option<ImageUpload>,
) -> AppResult<User> {
    let mut user = state.users.get_by_id(user_id).await?;
    let previous_image = user.profile_image.clone();

    apply_changes(&mut user, changes);

    let mut v = Validator::new();
    validate_profile(&mut v, &user);
    let upload = match image {
        Some(img) => match ext_from_mime(&img.content_type) {
            Some(ext) => Some((img, ext)),
            None => {
                v.add_error("profileImage", "must be a jpeg, png, webp or heic image");
                None
            }
        },
        None => None,
    };
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let mut uploaded_key = None;
    if let Some((img, ext)) = upload {
        let key = profile_image_key(user_id, Uuid::new_v4(), ext);
        state
            .storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .with_context(|| format!("put_object {key}"))
            .map_err(AppError::Upstream)?;
        user.profile_image = public_url(&state.config.s3.public_url, &key);
        uploaded_key = Some(key);
    }

    let user = match state.users.update(&user).await {
        Ok(u) => u,
        Err(e) => {
            if let Some(key) = uploaded_key {
                if let Err(err) = state.storage.delete_object(&key).await {
                    warn!(error = %err, key = %key, "failed to remove orphaned profile image");
                }
            }
            return Err(e.into());
        }
    };

    if user.profile_image != previous_image {
        if let Some(old_key) = owned_image_key(state, &previous_image) {
            if let Err(err) = state.storage.delete_object(old_key).await {
                warn!(error = %err, user_id, key = old_key, "failed to remove old profile image");
            }
        }
    }

    info!(user_id, "profile updated");
    Ok(user)
}

/// Deletes the caller's own account. Posts and tokens go with it.
pub async fn delete_user(state: &AppState, caller_id: i64, id: i64) -> AppResult<()> {
    if caller_id != id {
        warn!(caller_id, user_id = id, "attempt to delete another account");
        return Err(AppError::Forbidden("you can only delete your own account"));
    }

    let user = state.users.get_by_id(id).await?;
    if let Some(key) = owned_image_key(state, &user.profile_image) {
        state
            .storage
            .delete_object(key)
            .await
            .with_context(|| format!("delete_object {key}"))
            .map_err(AppError::Upstream)?;
    }

    state.users.delete(id).await?;
    info!(user_id = id, "user deleted");
    Ok(())
}
