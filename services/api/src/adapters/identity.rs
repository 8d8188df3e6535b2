//! services/api/src/adapters/identity.rs
//!
//! This module contains the adapter for the external identity provider.
//! It implements the `IdentityProviderService` port from the `core` crate:
//! a short-lived provider session id is traded for verified profile data,
//! so this service never sees the user's original credential.

use async_trait::async_trait;
use eiendel_core::domain::ExternalProfile;
use eiendel_core::ports::{IdentityProviderService, PortError, PortResult};
use serde::Deserialize;
use tracing::error;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that exchanges provider session ids over HTTPS.
#[derive(Clone)]
pub struct IdentityProviderAdapter {
    http: reqwest::Client,
    endpoint: String,
}

impl IdentityProviderAdapter {
    /// Creates a new `IdentityProviderAdapter` for the given exchange endpoint.
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

/// Wire shape of the provider's session-data response.
#[derive(Deserialize)]
struct SessionDataResponse {
    email: String,
    name: String,
    picture: Option<String>,
    session_token: String,
}

//=========================================================================================
// `IdentityProviderService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProviderService for IdentityProviderAdapter {
    async fn exchange_session(&self, external_session_id: &str) -> PortResult<ExternalProfile> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("X-Session-ID", external_session_id)
            .send()
            .await
            .map_err(|e| {
                error!("Identity provider request failed: {:?}", e);
                PortError::Unexpected(e.to_string())
            })?;

        // Any rejection by the provider means the session id is not (or no
        // longer) valid; the caller sees a plain Unauthorized.
        if !response.status().is_success() {
            return Err(PortError::Unauthorized);
        }

        let data: SessionDataResponse = response.json().await.map_err(|e| {
            error!("Identity provider returned an unreadable profile: {:?}", e);
            PortError::Unexpected(e.to_string())
        })?;

        Ok(ExternalProfile {
            email: data.email,
            name: data.name,
            picture: data.picture,
            session_token: data.session_token,
        })
    }
}
