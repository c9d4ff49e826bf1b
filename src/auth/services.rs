//! Registration, activation, login and password workflows.

use time::Duration;
use tracing::{info, warn};

use super::{
    jwt::JwtKeys,
    password::{Credential, CredentialError},
};
use crate::{
    error::{AppError, AppResult, StoreError},
    mailer::Email,
    state::AppState,
    tokens::{self, Scope, Token},
    users::{
        model::User,
        validation::{
            validate_email, validate_password_plaintext, validate_registration, validate_user,
        },
    },
    validator::Validator,
};

pub const ACTIVATION_TTL: Duration = Duration::hours(1);
pub const PASSWORD_RESET_TTL: Duration = Duration::hours(24);

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Internal(err.into())
    }
}

pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hands `email` to the background queue; delivery failures are only logged.
fn send_mail(state: &AppState, to: String, email: Email) {
    let mailer = state.mailer.clone();
    let job = match email {
        Email::Welcome { .. } => "welcome_email",
        Email::PasswordReset { .. } => "password_reset_email",
    };
    state.tasks.submit(job, async move {
        mailer.send(&to, &email).await?;
        anyhow::Ok(())
    });
}

/// Creates an unactivated user and mails an activation link. Returns the
/// activation token alongside the user; its plaintext is not stored.
pub async fn register(state: &AppState, input: Registration) -> AppResult<(User, Token)> {
    let name = input.name.trim().to_string();
    let username = input.username.trim().to_string();
    let email = normalize_email(&input.email);

    let mut v = Validator::new();
    validate_registration(&mut v, &name, &username, &email, &input.password);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let password = Credential::set(&input.password)?;
    let user = User::new(
        name,
        username,
        email,
        password,
        state.config.default_profile_image.clone(),
    );

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let user = state.users.insert(&user).await?;
    let token = tokens::issue(state.tokens.as_ref(), user.id, ACTIVATION_TTL, Scope::Activation)
        .await?;

    send_mail(
        state,
        user.email.clone(),
        Email::Welcome {
            name: user.name.clone(),
            activation_url: format!(
                "{}/v2/users/activate/{}",
                state.config.public_api_url.trim_end_matches('/'),
                token.plaintext
            ),
        },
    );

    info!(user_id = user.id, "user registered");
    Ok((user, token))
}

pub async fn activate(state: &AppState, plaintext: &str) -> AppResult<User> {
    let mut v = Validator::new();
    tokens::validate_token_plaintext(&mut v, plaintext);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let mut user = match tokens::lookup_user(state.users.as_ref(), Scope::Activation, plaintext).await
    {
        Ok(u) => u,
        Err(StoreError::NotFound) => return Err(AppError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    let user = state.users.update(&user).await?;
    state
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    info!(user_id = user.id, "user activated");
    Ok(user)
}

/// Checks credentials and signs a session token.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<(User, String)> {
    let email = normalize_email(email);

    let mut v = Validator::new();
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, "password", password);
    if !v.valid() {
        return Err(AppError::WrongCredentials);
    }

    let user = match state.users.get_by_email(&email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            Credential::match_decoy(password);
            warn!("login for unknown email");
            return Err(AppError::WrongCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !user.password.matches(password)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AppError::WrongPassword);
    }
    if !user.activated {
        return Err(AppError::NotActive);
    }

    let keys = JwtKeys::from(&state.config.jwt);
    let jwt = keys.sign(user.id).map_err(AppError::Internal)?;

    info!(user_id = user.id, "user logged in");
    Ok((user, jwt))
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    current: &str,
    new: &str,
    repeat: &str,
) -> AppResult<User> {
    let mut v = Validator::new();
    v.check(!current.is_empty(), "currentPassword", "must be provided");
    validate_password_plaintext(&mut v, "newPassword", new);
    v.check(new == repeat, "repeatNewPass", "must match the new password");
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let mut user = state.users.get_by_id(user_id).await?;
    if !user.password.matches(current)? {
        let mut v = Validator::new();
        v.add_error("currentPassword", "is incorrect");
        return Err(AppError::validation(v));
    }

    user.password = Credential::set(new)?;
    let user = state.users.update(&user).await?;
    info!(user_id, "password changed");
    Ok(user)
}

/// Mails a reset link when `email` belongs to an account. Unknown addresses
/// succeed silently so the endpoint cannot be used to probe for accounts.
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    let mut v = Validator::new();
    validate_email(&mut v, &email);
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let user = match state.users.get_by_email(&email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            info!("password reset requested for unknown email");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let token = tokens::issue(
        state.tokens.as_ref(),
        user.id,
        PASSWORD_RESET_TTL,
        Scope::PasswordReset,
    )
    .await?;

    send_mail(
        state,
        user.email.clone(),
        Email::PasswordReset {
            name: user.name.clone(),
            reset_url: format!(
                "{}/reset-password/{}",
                state.config.frontend_url.trim_end_matches('/'),
                token.plaintext
            ),
        },
    );

    info!(user_id = user.id, "password reset requested");
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    plaintext: &str,
    password: &str,
    confirm: &str,
) -> AppResult<User> {
    let mut v = Validator::new();
    tokens::validate_token_plaintext(&mut v, plaintext);
    validate_password_plaintext(&mut v, "password", password);
    v.check(password == confirm, "confirmPassword", "must match the password");
    if !v.valid() {
        return Err(AppError::validation(v));
    }

    let mut user =
        match tokens::lookup_user(state.users.as_ref(), Scope::PasswordReset, plaintext).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => return Err(AppError::InvalidToken),
            Err(e) => return Err(e.into()),
        };

    user.password = Credential::set(password)?;
    let user = state.users.update(&user).await?;
    state
        .tokens
        .delete_all_for_user(Scope::PasswordReset, user.id)
        .await?;

    info!(user_id = user.id, "password reset");
    Ok(user)
}
