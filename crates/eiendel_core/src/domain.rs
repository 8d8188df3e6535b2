//! crates/eiendel_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Currency applied to an item value when the client omits one.
pub const DEFAULT_CURRENCY: &str = "NOK";

/// Lifetime of a browser session, in days.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Package id whose purchase activates the buyer's subscription.
pub const SUBSCRIPTION_PACKAGE_ID: &str = "subscription";

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    /// `Some("active")` once a subscription purchase has completed.
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    /// Absent for accounts created through the identity provider.
    pub password_hash: Option<String>,
}

// Represents a browser login session (auth cookie or bearer token)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Profile data returned by the external identity provider in exchange
/// for a provider session id.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    /// Provider-issued token, reused as the local session token.
    pub session_token: String,
}

/// A single inventory record, owned by exactly one user.
///
/// The field names are the public JSON contract and are kept in the
/// original Norwegian: `navn` (name), `kategori` (category),
/// `serienummer` (serial number), `notat` (note), `verdi` (value),
/// `valuta` (currency), `vedlegg_urls` (attachment URLs).
#[derive(Debug, Clone)]
pub struct Item {
    pub item_id: String,
    pub user_id: String,
    pub navn: String,
    pub kategori: Option<String>,
    pub serienummer: Option<String>,
    pub notat: Option<String>,
    pub verdi: Option<f64>,
    pub valuta: String,
    pub vedlegg_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields for a new item. The server fills in the id,
/// both timestamps, and the currency/attachment defaults.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub navn: String,
    pub kategori: Option<String>,
    pub serienummer: Option<String>,
    pub notat: Option<String>,
    pub verdi: Option<f64>,
    pub valuta: Option<String>,
    pub vedlegg_urls: Option<Vec<String>>,
}

/// A merge-patch for an existing item: only present fields overwrite the
/// stored value, omitted fields are preserved.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub navn: Option<String>,
    pub kategori: Option<String>,
    pub serienummer: Option<String>,
    pub notat: Option<String>,
    pub verdi: Option<f64>,
    pub valuta: Option<String>,
    pub vedlegg_urls: Option<Vec<String>>,
}

impl ItemPatch {
    /// True when the patch carries no fields. Applying it still refreshes
    /// `updated_at`.
    pub fn is_empty(&self) -> bool {
        self.navn.is_none()
            && self.kategori.is_none()
            && self.serienummer.is_none()
            && self.notat.is_none()
            && self.verdi.is_none()
            && self.valuta.is_none()
            && self.vedlegg_urls.is_none()
    }
}

/// Local state of a checkout with the external payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

/// Record of a checkout initiated against the external processor.
/// Transitions `pending -> paid` exactly once.
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    /// External checkout session id, unique per transaction.
    pub session_id: String,
    pub user_id: String,
    pub package_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A purchasable package. Amounts live server-side only; client-supplied
/// amounts are never trusted.
#[derive(Debug, Clone, Copy)]
pub struct PaymentPackage {
    pub id: &'static str,
    pub amount: f64,
    pub currency: &'static str,
    pub description: &'static str,
}

const PAYMENT_PACKAGES: [PaymentPackage; 2] = [
    PaymentPackage {
        id: SUBSCRIPTION_PACKAGE_ID,
        amount: 49.0,
        currency: DEFAULT_CURRENCY,
        description: "Månedlig abonnement",
    },
    PaymentPackage {
        id: "import",
        amount: 29.0,
        currency: DEFAULT_CURRENCY,
        description: "Engangstillegg for PDF-import",
    },
];

/// Looks up a package in the fixed, server-defined price list.
pub fn payment_package(package_id: &str) -> Option<&'static PaymentPackage> {
    PAYMENT_PACKAGES.iter().find(|p| p.id == package_id)
}

//=========================================================================================
// Id Minting
//=========================================================================================

// All ids are opaque prefixed strings; the prefix makes log lines and
// support tickets self-describing.

pub fn new_user_id() -> String {
    format!("user_{}", short_hex())
}

pub fn new_item_id() -> String {
    format!("item_{}", short_hex())
}

pub fn new_transaction_id() -> String {
    format!("txn_{}", short_hex())
}

pub fn new_session_token() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

fn short_hex() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..12].to_string()
}
