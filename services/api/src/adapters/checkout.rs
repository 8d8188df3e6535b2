//! services/api/src/adapters/checkout.rs
//!
//! This module contains the adapter for the external payment processor
//! (Stripe Checkout). It implements the `CheckoutService` port from the
//! `core` crate: creating hosted checkout sessions, polling their status,
//! and verifying webhook signatures.

use async_trait::async_trait;
use chrono::Utc;
use eiendel_core::ports::{
    CheckoutRequest, CheckoutService, CheckoutSession, CheckoutStatus, PortError, PortResult,
    WebhookEvent,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the processor's hosted-checkout API and
/// verifies its webhook deliveries.
#[derive(Clone)]
pub struct StripeCheckoutAdapter {
    http: reqwest::Client,
    api_key: String,
    webhook_secret: Option<String>,
    api_base_url: String,
}

impl StripeCheckoutAdapter {
    /// Creates a new `StripeCheckoutAdapter`.
    pub fn new(api_key: String, webhook_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            webhook_secret,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Overrides the API base URL (for tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Wire shape of a created checkout session.
#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

/// Wire shape of a checkout-session status lookup.
#[derive(Deserialize)]
struct SessionStatusResponse {
    status: String,
    payment_status: String,
}

/// Envelope of a webhook event; only the fields this service acts on.
#[derive(Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: serde_json::Value,
}

/// The processor's API takes amounts in minor units (øre).
fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

//=========================================================================================
// Webhook Signature Parsing
//=========================================================================================

/// Parsed components of the processor's signature header.
///
/// Format: `t=<timestamp>,v1=<hex signature>[,...]`; unknown fields are
/// ignored for forward compatibility.
struct SignatureHeader {
    timestamp: i64,
    v1_signature: Vec<u8>,
}

impl SignatureHeader {
    fn parse(header: &str) -> PortResult<Self> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| PortError::BadRequest("Invalid signature header".to_string()))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        PortError::BadRequest("Invalid signature timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex_decode(value.trim()).ok_or_else(|| {
                        PortError::BadRequest("Invalid signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp
                .ok_or_else(|| PortError::BadRequest("Missing signature timestamp".to_string()))?,
            v1_signature: v1_signature
                .ok_or_else(|| PortError::BadRequest("Missing v1 signature".to_string()))?,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
    }
    Some(bytes)
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison so verification leaks no timing information.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

//=========================================================================================
// `CheckoutService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CheckoutService for StripeCheckoutAdapter {
    async fn create_checkout(&self, request: CheckoutRequest) -> PortResult<CheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url),
            ("cancel_url".to_string(), request.cancel_url),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                to_minor_units(request.amount).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description,
            ),
        ];
        for (key, value) in request.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base_url))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Checkout session creation failed: {:?}", e);
                PortError::Unexpected(e.to_string())
            })?;

        if !response.status().is_success() {
            error!(
                "Checkout provider rejected session creation: {}",
                response.status()
            );
            return Err(PortError::Unexpected(
                "Checkout provider rejected the request".to_string(),
            ));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let url = session.url.ok_or_else(|| {
            PortError::Unexpected("Checkout session has no redirect URL".to_string())
        })?;

        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }

    async fn get_checkout_status(&self, session_id: &str) -> PortResult<CheckoutStatus> {
        let response = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base_url, session_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!("Checkout status lookup failed: {:?}", e);
                PortError::Unexpected(e.to_string())
            })?;

        if !response.status().is_success() {
            error!(
                "Checkout provider rejected status lookup: {}",
                response.status()
            );
            return Err(PortError::Unexpected(
                "Checkout provider rejected the request".to_string(),
            ));
        }

        let status: SessionStatusResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(CheckoutStatus {
            status: status.status,
            payment_status: status.payment_status,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> PortResult<WebhookEvent> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            PortError::ServiceUnavailable("Webhook secret is not configured".to_string())
        })?;

        let header = SignatureHeader::parse(signature_header)?;

        // Bound the replay window before doing any crypto.
        let age = Utc::now().timestamp() - header.timestamp;
        if age > MAX_EVENT_AGE_SECS {
            return Err(PortError::BadRequest("Webhook event too old".to_string()));
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(PortError::BadRequest(
                "Webhook event timestamp is in the future".to_string(),
            ));
        }

        let expected = compute_signature(secret, header.timestamp, payload);
        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(PortError::BadRequest("Invalid webhook signature".to_string()));
        }

        let event: EventPayload = serde_json::from_slice(payload)
            .map_err(|e| PortError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        let session_id = event
            .data
            .object
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let payment_status = event
            .data
            .object
            .get("payment_status")
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(WebhookEvent {
            event_type: event.event_type,
            session_id,
            payment_status,
        })
    }
}
