//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::MediaSigner;
use crate::config::Config;
use eiendel_core::ports::{CheckoutService, DatabaseService, IdentityProviderService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The checkout processor and the media signer are optional: when their
/// credentials are absent from the environment the corresponding routes
/// answer 503 instead of failing at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub identity: Arc<dyn IdentityProviderService>,
    pub checkout: Option<Arc<dyn CheckoutService>>,
    pub media: Option<Arc<MediaSigner>>,
    pub config: Arc<Config>,
}
