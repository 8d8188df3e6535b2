//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, login, identity-provider session
//! exchange, current-user lookup, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use eiendel_core::domain::{self, User, SESSION_TTL_DAYS};
use eiendel_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::middleware::extract_session_token;
use crate::web::state::AppState;
use crate::web::{port_error_response, MessageResponse};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ExternalSessionRequest {
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        }
    }
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            picture: user.picture,
            subscription_status: user.subscription_status,
            created_at: user.created_at,
        }
    }
}

//=========================================================================================
// Session Helpers
//=========================================================================================

/// The session cookie must survive cross-site navigation back from the
/// checkout processor, hence SameSite=None.
fn session_cookie(token: &str) -> String {
    format!(
        "session_token={}; HttpOnly; Secure; SameSite=None; Path=/; Max-Age={}",
        token,
        Duration::days(SESSION_TTL_DAYS).num_seconds()
    )
}

fn clear_session_cookie() -> String {
    "session_token=; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=0".to_string()
}

/// Persists a session for `user_id` under `token`, valid for the fixed
/// 7-day window.
async fn open_session(
    state: &Arc<AppState>,
    token: &str,
    user_id: &str,
) -> Result<(), (StatusCode, String)> {
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    state
        .db
        .create_session(token, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User created successfully", body = UserResponse),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })?
        .to_string();

    // 2. Create the user; a duplicate email surfaces as Conflict
    let user = state
        .db
        .create_user_with_password(&req.email, &req.name, &password_hash)
        .await
        .map_err(|e| port_error_response("Failed to create user", e))?;

    // 3. Open a fresh session and hand the cookie back
    let session_token = domain::new_session_token();
    open_session(&state, &session_token, &user.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session_token))],
        Json(UserResponse::from(user)),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The same message covers an unknown email and a wrong password, so
    // responses cannot be used to enumerate accounts.
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        )
    };

    // 1. Get credentials by email
    let creds = state
        .db
        .get_credentials_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            _ => {
                error!("Failed to get user: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal error occurred".to_string(),
                )
            }
        })?;

    // 2. Verify the password. Accounts created through the identity
    //    provider carry no hash and cannot log in with a password.
    let stored_hash = creds.password_hash.as_deref().ok_or_else(invalid)?;
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(invalid());
    }

    // 3. Open a fresh session
    let session_token = domain::new_session_token();
    open_session(&state, &session_token, &creds.user_id).await?;

    let response = UserResponse {
        user_id: creds.user_id,
        email: creds.email,
        name: creds.name,
        picture: creds.picture,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session_token))],
        Json(response),
    ))
}

/// POST /api/auth/session - Exchange an identity-provider session id
#[utoipa::path(
    post,
    path = "/api/auth/session",
    request_body = ExternalSessionRequest,
    responses(
        (status = 200, description = "Session established", body = UserResponse),
        (status = 401, description = "Provider rejected the session id"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn exchange_session_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExternalSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Trade the provider session id for profile data
    let profile = state
        .identity
        .exchange_session(&req.session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Invalid session_id".to_string())
            }
            _ => {
                error!("Identity-provider exchange failed: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected internal error occurred".to_string(),
                )
            }
        })?;

    // 2. Create the user on first login, otherwise sync name/picture
    let user = state
        .db
        .sync_external_user(&profile.email, &profile.name, profile.picture.as_deref())
        .await
        .map_err(|e| port_error_response("Failed to sync external user", e))?;

    // 3. Reuse the provider-issued token as the local session token
    open_session(&state, &profile.session_token, &user.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&profile.session_token))],
        Json(UserResponse::from(user)),
    ))
}

/// GET /api/auth/me - Current authenticated user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired session"),
        (status = 404, description = "Session user record is missing")
    )
)]
pub async fn me_handler(Extension(user): Extension<User>) -> Json<MeResponse> {
    Json(MeResponse::from(user))
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The delete is idempotent: a token that is already gone is fine.
    if let Some(session_token) = extract_session_token(&headers) {
        state
            .db
            .delete_session(&session_token)
            .await
            .map_err(|e| {
                error!("Failed to delete auth session: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to logout".to_string(),
                )
            })?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}
