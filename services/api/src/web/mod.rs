//! services/api/src/web/mod.rs
//!
//! The HTTP layer: route handlers, auth middleware, shared state, and the
//! master OpenAPI definition.

pub mod auth;
pub mod items;
pub mod middleware;
pub mod payments;
pub mod state;
pub mod uploads;

pub use middleware::require_auth;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use eiendel_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::exchange_session_handler,
        auth::me_handler,
        auth::logout_handler,
        items::list_items_handler,
        items::create_item_handler,
        items::get_item_handler,
        items::update_item_handler,
        items::delete_item_handler,
        uploads::upload_signature_handler,
        payments::create_checkout_handler,
        payments::payment_status_handler,
        payments::payments_webhook_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::ExternalSessionRequest,
            auth::UserResponse,
            auth::MeResponse,
            items::CreateItemRequest,
            items::UpdateItemRequest,
            items::ItemResponse,
            uploads::SignatureResponse,
            payments::PaymentRequest,
            payments::CheckoutResponse,
            payments::PaymentStatusResponse,
            payments::WebhookAck,
            MessageResponse,
        )
    ),
    tags(
        (name = "Eiendel API", description = "API endpoints for the personal inventory service.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Response Types and Error Mapping
//=========================================================================================

/// A plain confirmation message.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Maps a port error onto the HTTP surface.
///
/// Everything except `Unexpected` carries a client-safe message; the
/// unexpected case is logged with its context and answered generically so
/// internal detail never leaks.
pub(crate) fn port_error_response(context: &str, err: PortError) -> (StatusCode, String) {
    match err {
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        PortError::Unexpected(detail) => {
            error!("{}: {}", context, detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected internal error occurred".to_string(),
            )
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Builds the full API router. The binary layers CORS and Swagger UI on
/// top; integration tests drive this router directly.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required; the webhook authenticates itself
    // through its signature)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/session", post(auth::exchange_session_handler))
        .route("/webhook/payments", post(payments::payments_webhook_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/items",
            get(items::list_items_handler).post(items::create_item_handler),
        )
        .route(
            "/items/{item_id}",
            get(items::get_item_handler)
                .put(items::update_item_handler)
                .delete(items::delete_item_handler),
        )
        .route("/upload/signature", get(uploads::upload_signature_handler))
        .route("/payments/checkout", post(payments::create_checkout_handler))
        .route(
            "/payments/status/{session_id}",
            get(payments::payment_status_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .nest("/api", Router::new().merge(public_routes).merge(protected_routes))
        .with_state(state)
}
