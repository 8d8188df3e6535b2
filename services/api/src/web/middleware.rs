//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use eiendel_core::ports::PortError;
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Pulls the session token out of a request.
///
/// The same-site cookie is preferred; a bearer-style `Authorization`
/// header is accepted as a fallback so API clients without a cookie jar
/// resolve identically.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .find_map(|c| c.trim().strip_prefix("session_token="))
                .map(str::to_string)
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Middleware that resolves the session token and loads the current user.
///
/// If valid, inserts the domain `User` into request extensions for
/// handlers to use. A missing, unknown, or expired session is 401; a
/// session whose user record has vanished is a data-integrity anomaly and
/// is surfaced as 404 rather than silently recovered.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    // 1. Extract the session token (cookie first, then bearer header)
    let session_token = extract_session_token(req.headers())
        .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))?;

    // 2. Look up the session
    let session = state
        .db
        .get_session(&session_token)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::UNAUTHORIZED, "Invalid session".to_string()),
            _ => {
                error!("Failed to look up auth session: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid session".to_string())
            }
        })?;

    // 3. Expired sessions are detected here lazily; nothing sweeps them
    if session.expires_at < Utc::now() {
        return Err((StatusCode::UNAUTHORIZED, "Session expired".to_string()));
    }

    // 4. Load the owning user record
    let user = state.db.get_user(&session.user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
        _ => {
            error!("Failed to load session user: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected internal error occurred".to_string(),
            )
        }
    })?;

    // 5. Insert the user into request extensions and continue
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
