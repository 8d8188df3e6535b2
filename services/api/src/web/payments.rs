//! services/api/src/web/payments.rs
//!
//! Payment endpoints: checkout creation against the fixed price list,
//! status polling, and the processor webhook. The pending->paid
//! transition is guarded in the store so the poll and the webhook can
//! race without double-applying the subscription side effect.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use eiendel_core::domain::{
    self, PaymentStatus, PaymentTransaction, User, SUBSCRIPTION_PACKAGE_ID,
};
use eiendel_core::ports::{CheckoutRequest, DatabaseService, PortError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::web::port_error_response;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub package_id: String,
    /// Origin the success/cancel redirects are built from.
    pub origin_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub status: String,
    pub payment_status: String,
    pub package_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: String,
}

//=========================================================================================
// Paid-Transition Helper
//=========================================================================================

/// Applies the paid-transition for a transaction, whichever path (status
/// poll or webhook) observed it first. The store's guarded update returns
/// true exactly once, and only that caller activates the subscription.
async fn apply_paid_transition(
    db: &Arc<dyn DatabaseService>,
    txn: &PaymentTransaction,
) -> Result<(), PortError> {
    let transitioned = db.mark_transaction_paid(&txn.session_id).await?;
    if transitioned && txn.package_id == SUBSCRIPTION_PACKAGE_ID {
        db.activate_subscription(&txn.user_id).await?;
    }
    Ok(())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/payments/checkout - Start a checkout for a fixed package
#[utoipa::path(
    post,
    path = "/api/payments/checkout",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Unknown package id"),
        (status = 503, description = "Payment processor not configured")
    )
)]
pub async fn create_checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the package against the server-side price list; the
    //    client never supplies an amount.
    let package = domain::payment_package(&req.package_id)
        .ok_or((StatusCode::BAD_REQUEST, "Invalid package".to_string()))?;

    let checkout = state.checkout.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Payment processor is not configured".to_string(),
    ))?;

    // 2. Build the redirect URLs from the caller's origin
    let success_url = format!(
        "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
        req.origin_url
    );
    let cancel_url = format!("{}/dashboard", req.origin_url);

    let mut metadata = HashMap::new();
    metadata.insert("user_id".to_string(), user.user_id.clone());
    metadata.insert("package_id".to_string(), req.package_id.clone());
    metadata.insert("description".to_string(), package.description.to_string());

    // 3. Create the processor-side session
    let session = checkout
        .create_checkout(CheckoutRequest {
            amount: package.amount,
            currency: package.currency.to_string(),
            description: package.description.to_string(),
            success_url,
            cancel_url,
            metadata,
        })
        .await
        .map_err(|e| port_error_response("Failed to create checkout session", e))?;

    // 4. Persist the pending transaction before answering, so a webhook
    //    arriving immediately still finds it
    let txn = PaymentTransaction {
        transaction_id: domain::new_transaction_id(),
        session_id: session.session_id.clone(),
        user_id: user.user_id.clone(),
        package_id: req.package_id,
        amount: package.amount,
        currency: package.currency.to_string(),
        payment_status: PaymentStatus::Pending,
        created_at: Utc::now(),
        completed_at: None,
    };
    state
        .db
        .create_transaction(txn)
        .await
        .map_err(|e| port_error_response("Failed to record transaction", e))?;

    Ok(Json(CheckoutResponse {
        url: session.url,
        session_id: session.session_id,
    }))
}

/// GET /api/payments/status/{session_id} - Poll a checkout's status
#[utoipa::path(
    get,
    path = "/api/payments/status/{session_id}",
    params(("session_id" = String, Path, description = "External checkout session id")),
    responses(
        (status = 200, description = "Current payment status", body = PaymentStatusResponse),
        (status = 404, description = "No such transaction for this caller"),
        (status = 503, description = "Payment processor not configured")
    )
)]
pub async fn payment_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. The transaction must exist and belong to the caller
    let txn = state
        .db
        .get_transaction(&user.user_id, &session_id)
        .await
        .map_err(|e| port_error_response("Failed to load transaction", e))?;

    // 2. A finished transaction answers from the store; no redundant
    //    round-trip to the processor
    if txn.payment_status == PaymentStatus::Paid {
        return Ok(Json(PaymentStatusResponse {
            status: "complete".to_string(),
            payment_status: "paid".to_string(),
            package_id: txn.package_id,
        }));
    }

    let checkout = state.checkout.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Payment processor is not configured".to_string(),
    ))?;

    // 3. Poll the processor and apply the transition on first observation
    let status = checkout
        .get_checkout_status(&session_id)
        .await
        .map_err(|e| port_error_response("Failed to poll checkout status", e))?;

    if status.payment_status == "paid" {
        apply_paid_transition(&state.db, &txn)
            .await
            .map_err(|e| port_error_response("Failed to apply paid transition", e))?;
    }

    Ok(Json(PaymentStatusResponse {
        status: status.status,
        payment_status: status.payment_status,
        package_id: txn.package_id,
    }))
}

/// POST /api/webhook/payments - Processor webhook (signature-verified)
#[utoipa::path(
    post,
    path = "/api/webhook/payments",
    request_body(content = String, content_type = "application/json", description = "Raw processor webhook payload"),
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 400, description = "Bad signature or malformed payload"),
        (status = 503, description = "Payment processor not configured")
    )
)]
pub async fn payments_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let checkout = state.checkout.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Payment processor is not configured".to_string(),
    ))?;

    // 1. Verify the signature over the raw body before trusting anything
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let event = checkout
        .verify_webhook(&body, signature)
        .map_err(|e| port_error_response("Webhook verification failed", e))?;

    // 2. A paid event applies the same guarded transition as the poll path
    if event.payment_status.as_deref() == Some("paid") {
        if let Some(session_id) = &event.session_id {
            match state.db.get_transaction_by_session(session_id).await {
                Ok(txn) => {
                    apply_paid_transition(&state.db, &txn)
                        .await
                        .map_err(|e| port_error_response("Failed to apply paid transition", e))?;
                }
                // A session this service never issued is acknowledged and
                // dropped; the processor retries hard failures only.
                Err(PortError::NotFound(_)) => {
                    warn!(
                        "Webhook for unknown checkout session {}, event {}",
                        session_id, event.event_type
                    );
                }
                Err(e) => {
                    error!("Failed to load webhook transaction: {:?}", e);
                    return Err((
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An unexpected internal error occurred".to_string(),
                    ));
                }
            }
        }
    }

    Ok(Json(WebhookAck {
        status: "success".to_string(),
    }))
}
