//! crates/eiendel_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::{
    AuthSession, ExternalProfile, Item, ItemDraft, ItemPatch, PaymentTransaction, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network)
/// into the taxonomy every HTTP handler maps from.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Missing/invalid/expired session or bad credentials.
    #[error("Unauthorized")]
    Unauthorized,
    /// Resource absent, or present but owned by someone else. Ownership
    /// failures are deliberately indistinguishable from absence.
    #[error("{0}")]
    NotFound(String),
    /// Uniqueness violated (duplicate email).
    #[error("{0}")]
    Conflict(String),
    /// Client supplied something the server refuses (unknown package id,
    /// malformed webhook signature).
    #[error("{0}")]
    BadRequest(String),
    /// A required external integration is not configured.
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Directory ---
    async fn create_user_with_password(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: &str) -> PortResult<User>;

    /// Creates the user on first identity-provider login, otherwise
    /// refreshes name/picture from the provider profile.
    async fn sync_external_user(
        &self,
        email: &str,
        name: &str,
        picture: Option<&str>,
    ) -> PortResult<User>;

    async fn activate_subscription(&self, user_id: &str) -> PortResult<()>;

    // --- Session Store ---
    async fn create_session(
        &self,
        session_token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn get_session(&self, session_token: &str) -> PortResult<AuthSession>;

    /// Idempotent: deleting an absent session is not an error.
    async fn delete_session(&self, session_token: &str) -> PortResult<()>;

    // --- Item Repository (all operations scoped by owner) ---
    async fn list_items(&self, owner: &str) -> PortResult<Vec<Item>>;

    async fn create_item(&self, owner: &str, draft: ItemDraft) -> PortResult<Item>;

    async fn get_item(&self, owner: &str, item_id: &str) -> PortResult<Item>;

    /// Merge-patch: only present fields are applied; `updated_at` is
    /// refreshed unconditionally.
    async fn update_item(&self, owner: &str, item_id: &str, patch: ItemPatch) -> PortResult<Item>;

    async fn delete_item(&self, owner: &str, item_id: &str) -> PortResult<()>;

    // --- Payment Transactions ---
    async fn create_transaction(&self, txn: PaymentTransaction) -> PortResult<PaymentTransaction>;

    async fn get_transaction(
        &self,
        owner: &str,
        session_id: &str,
    ) -> PortResult<PaymentTransaction>;

    /// Unscoped lookup for the webhook path, which carries no session.
    async fn get_transaction_by_session(&self, session_id: &str)
        -> PortResult<PaymentTransaction>;

    /// Atomically flips the transaction to `paid`, guarded on the prior
    /// status. Returns `true` only for the call that made the transition,
    /// so a racing poll and webhook apply side effects exactly once.
    async fn mark_transaction_paid(&self, session_id: &str) -> PortResult<bool>;
}

#[async_trait]
pub trait IdentityProviderService: Send + Sync {
    /// Trades a short-lived provider session id for verified profile data.
    async fn exchange_session(&self, external_session_id: &str) -> PortResult<ExternalProfile>;
}

/// Parameters for creating a checkout with the external processor.
/// Amount and currency always come from the server-side price list.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// A processor-side checkout session the client is redirected to.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Processor-reported state of a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutStatus {
    /// Session state as the processor names it (open/complete/expired).
    pub status: String,
    /// Payment state as the processor names it (unpaid/paid/...).
    pub payment_status: String,
}

/// A signature-verified webhook notification from the processor.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub payment_status: Option<String>,
}

#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest) -> PortResult<CheckoutSession>;

    async fn get_checkout_status(&self, session_id: &str) -> PortResult<CheckoutStatus>;

    /// Verifies the processor's signature over the raw payload and parses
    /// the event. Fails with `BadRequest` on any verification failure.
    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> PortResult<WebhookEvent>;
}
