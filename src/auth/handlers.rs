use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, CheckAuthResponse, ForgotPasswordRequest, LoginRequest,
            MessageResponse, RegisterRequest, ResetPasswordRequest,
        },
        jwt::{expired_session_cookie, AuthUser, JwtKeys},
        services::{self, Registration},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::model::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/registration", post(register))
        .route("/users/activate/:token", get(activate))
        .route("/users/login", post(login))
        .route("/users/check-auth", get(check_auth))
        .route("/users/logout", post(logout))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/reset-password", post(reset_password))
        .route("/users/password", patch(change_password))
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
}

fn cookie_header(value: String) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&value).map_err(|e| {
        error!(error = %e, "invalid cookie header");
        AppError::Internal(e.into())
    })?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (user, _token) = services::register(
        &state,
        Registration {
            name: payload.name,
            username: payload.username,
            email: payload.email,
            password: payload.password,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user })))
}

#[instrument(skip(state, token))]
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = services::activate(&state, &token).await?;
    Ok((StatusCode::ACCEPTED, Json(AuthResponse { user })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let (user, jwt) = services::login(&state, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from(&state.config.jwt);
    let headers = cookie_header(keys.session_cookie(&jwt))?;
    Ok((headers, Json(AuthResponse { user })))
}

/// 200 with a valid session, 401 otherwise.
#[instrument(skip_all)]
pub async fn check_auth(
    auth: Result<AuthUser, AppError>,
) -> (StatusCode, Json<CheckAuthResponse>) {
    match auth {
        Ok(_) => (
            StatusCode::OK,
            Json(CheckAuthResponse {
                authenticated: true,
            }),
        ),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(CheckAuthResponse {
                authenticated: false,
            }),
        ),
    }
}

/// Sessions are stateless, so logging out only clears the cookie.
#[instrument]
pub async fn logout() -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let headers = cookie_header(expired_session_cookie())?;
    Ok((
        headers,
        Json(MessageResponse {
            message: "logged out",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::forgot_password(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "if an account with that email exists, a reset link has been sent",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(
        &state,
        &payload.token,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "your password was successfully reset",
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::change_password(
        &state,
        user_id,
        &payload.current_password,
        &payload.new_password,
        &payload.repeat_new_pass,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "password changed",
    }))
}
