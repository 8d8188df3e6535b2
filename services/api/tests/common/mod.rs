//! Common test utilities for api integration tests: an in-memory store,
//! mock external providers, and a `TestServer` builder wired the same way
//! as the production router.

use api_lib::adapters::MediaSigner;
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use eiendel_core::domain::{
    self, AuthSession, ExternalProfile, Item, ItemDraft, ItemPatch, PaymentStatus,
    PaymentTransaction, User, UserCredentials, DEFAULT_CURRENCY,
};
use eiendel_core::ports::{
    CheckoutRequest, CheckoutService, CheckoutSession, CheckoutStatus, DatabaseService,
    IdentityProviderService, PortError, PortResult, WebhookEvent,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::Level;

/// Signature header the mock checkout provider accepts. Real signature
/// verification is unit-tested against the concrete adapter.
pub const TEST_WEBHOOK_SIGNATURE: &str = "t=0,v1=test";

//=========================================================================================
// In-Memory Database
//=========================================================================================

#[derive(Clone)]
struct StoredUser {
    user: User,
    password_hash: Option<String>,
}

#[derive(Default)]
struct MemoryInner {
    users: Vec<StoredUser>,
    sessions: HashMap<String, AuthSession>,
    items: Vec<Item>,
    transactions: Vec<PaymentTransaction>,
    activation_count: usize,
}

/// An in-memory `DatabaseService` with the same observable semantics as
/// the PostgreSQL adapter.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a subscription activation has been applied.
    pub fn activation_count(&self) -> usize {
        self.inner.lock().unwrap().activation_count
    }

    pub fn subscription_status(&self, user_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|s| s.user.user_id == user_id)
            .and_then(|s| s.user.subscription_status.clone())
    }

    /// Drops a user record while leaving sessions behind, to provoke the
    /// data-integrity path.
    pub fn remove_user(&self, user_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .users
            .retain(|s| s.user.user_id != user_id);
    }

    /// Inserts a session directly, bypassing the handlers, so tests can
    /// fabricate expired sessions.
    pub fn insert_session(&self, token: &str, user_id: &str, expires_at: DateTime<Utc>) {
        self.inner.lock().unwrap().sessions.insert(
            token.to_string(),
            AuthSession {
                session_token: token.to_string(),
                user_id: user_id.to_string(),
                expires_at,
                created_at: Utc::now(),
            },
        );
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn create_user_with_password(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|s| s.user.email == email) {
            return Err(PortError::Conflict("Email already registered".to_string()));
        }
        let user = User {
            user_id: domain::new_user_id(),
            email: email.to_string(),
            name: name.to_string(),
            picture: None,
            subscription_status: None,
            created_at: Utc::now(),
        };
        inner.users.push(StoredUser {
            user: user.clone(),
            password_hash: Some(password_hash.to_string()),
        });
        Ok(user)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let inner = self.inner.lock().unwrap();
        let stored = inner
            .users
            .iter()
            .find(|s| s.user.email == email)
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))?;
        Ok(UserCredentials {
            user_id: stored.user.user_id.clone(),
            email: stored.user.email.clone(),
            name: stored.user.name.clone(),
            picture: stored.user.picture.clone(),
            password_hash: stored.password_hash.clone(),
        })
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .iter()
            .find(|s| s.user.user_id == user_id)
            .map(|s| s.user.clone())
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn sync_external_user(
        &self,
        email: &str,
        name: &str,
        picture: Option<&str>,
    ) -> PortResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.users.iter_mut().find(|s| s.user.email == email) {
            stored.user.name = name.to_string();
            stored.user.picture = picture.map(String::from);
            return Ok(stored.user.clone());
        }
        let user = User {
            user_id: domain::new_user_id(),
            email: email.to_string(),
            name: name.to_string(),
            picture: picture.map(String::from),
            subscription_status: None,
            created_at: Utc::now(),
        };
        inner.users.push(StoredUser {
            user: user.clone(),
            password_hash: None,
        });
        Ok(user)
    }

    async fn activate_subscription(&self, user_id: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.users.iter_mut().find(|s| s.user.user_id == user_id) {
            stored.user.subscription_status = Some("active".to_string());
        }
        inner.activation_count += 1;
        Ok(())
    }

    async fn create_session(
        &self,
        session_token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.insert_session(session_token, user_id, expires_at);
        Ok(())
    }

    async fn get_session(&self, session_token: &str) -> PortResult<AuthSession> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Session not found".to_string()))
    }

    async fn delete_session(&self, session_token: &str) -> PortResult<()> {
        self.inner.lock().unwrap().sessions.remove(session_token);
        Ok(())
    }

    async fn list_items(&self, owner: &str) -> PortResult<Vec<Item>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|i| i.user_id == owner)
            .cloned()
            .collect())
    }

    async fn create_item(&self, owner: &str, draft: ItemDraft) -> PortResult<Item> {
        let now = Utc::now();
        let item = Item {
            item_id: domain::new_item_id(),
            user_id: owner.to_string(),
            navn: draft.navn,
            kategori: draft.kategori,
            serienummer: draft.serienummer,
            notat: draft.notat,
            verdi: draft.verdi,
            valuta: draft.valuta.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            vedlegg_urls: draft.vedlegg_urls.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().items.push(item.clone());
        Ok(item)
    }

    async fn get_item(&self, owner: &str, item_id: &str) -> PortResult<Item> {
        self.inner
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|i| i.item_id == item_id && i.user_id == owner)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Item not found".to_string()))
    }

    async fn update_item(&self, owner: &str, item_id: &str, patch: ItemPatch) -> PortResult<Item> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.item_id == item_id && i.user_id == owner)
            .ok_or_else(|| PortError::NotFound("Item not found".to_string()))?;

        if let Some(navn) = patch.navn {
            item.navn = navn;
        }
        if let Some(kategori) = patch.kategori {
            item.kategori = Some(kategori);
        }
        if let Some(serienummer) = patch.serienummer {
            item.serienummer = Some(serienummer);
        }
        if let Some(notat) = patch.notat {
            item.notat = Some(notat);
        }
        if let Some(verdi) = patch.verdi {
            item.verdi = Some(verdi);
        }
        if let Some(valuta) = patch.valuta {
            item.valuta = valuta;
        }
        if let Some(vedlegg_urls) = patch.vedlegg_urls {
            item.vedlegg_urls = vedlegg_urls;
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&self, owner: &str, item_id: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.items.len();
        inner
            .items
            .retain(|i| !(i.item_id == item_id && i.user_id == owner));
        if inner.items.len() == before {
            return Err(PortError::NotFound("Item not found".to_string()));
        }
        Ok(())
    }

    async fn create_transaction(&self, txn: PaymentTransaction) -> PortResult<PaymentTransaction> {
        self.inner.lock().unwrap().transactions.push(txn.clone());
        Ok(txn)
    }

    async fn get_transaction(
        &self,
        owner: &str,
        session_id: &str,
    ) -> PortResult<PaymentTransaction> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.session_id == session_id && t.user_id == owner)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Transaction not found".to_string()))
    }

    async fn get_transaction_by_session(
        &self,
        session_id: &str,
    ) -> PortResult<PaymentTransaction> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.session_id == session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Transaction not found".to_string()))
    }

    async fn mark_transaction_paid(&self, session_id: &str) -> PortResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(txn) = inner
            .transactions
            .iter_mut()
            .find(|t| t.session_id == session_id)
        else {
            return Ok(false);
        };
        if txn.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }
        txn.payment_status = PaymentStatus::Paid;
        txn.completed_at = Some(Utc::now());
        Ok(true)
    }
}

//=========================================================================================
// Mock External Providers
//=========================================================================================

/// Mock identity provider backed by a map of known session ids.
#[derive(Clone, Default)]
pub struct MockIdentity {
    profiles: Arc<Mutex<HashMap<String, ExternalProfile>>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, external_session_id: &str, profile: ExternalProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(external_session_id.to_string(), profile);
    }
}

#[async_trait]
impl IdentityProviderService for MockIdentity {
    async fn exchange_session(&self, external_session_id: &str) -> PortResult<ExternalProfile> {
        self.profiles
            .lock()
            .unwrap()
            .get(external_session_id)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }
}

#[derive(Default)]
struct CheckoutInner {
    /// session_id -> (status, payment_status) as the processor reports it.
    statuses: HashMap<String, (String, String)>,
    last_request: Option<CheckoutRequest>,
    created: usize,
    status_calls: usize,
}

/// Mock checkout provider that mints predictable session ids and serves
/// test-controlled statuses.
#[derive(Clone, Default)]
pub struct MockCheckout {
    inner: Arc<Mutex<CheckoutInner>>,
}

impl MockCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, session_id: &str, status: &str, payment_status: &str) {
        self.inner.lock().unwrap().statuses.insert(
            session_id.to_string(),
            (status.to_string(), payment_status.to_string()),
        );
    }

    pub fn status_calls(&self) -> usize {
        self.inner.lock().unwrap().status_calls
    }

    pub fn last_request(&self) -> Option<CheckoutRequest> {
        self.inner.lock().unwrap().last_request.clone()
    }
}

#[async_trait]
impl CheckoutService for MockCheckout {
    async fn create_checkout(&self, request: CheckoutRequest) -> PortResult<CheckoutSession> {
        let mut inner = self.inner.lock().unwrap();
        inner.created += 1;
        let session_id = format!("cs_test_{}", inner.created);
        inner.statuses.insert(
            session_id.clone(),
            ("open".to_string(), "unpaid".to_string()),
        );
        inner.last_request = Some(request);
        Ok(CheckoutSession {
            url: format!("https://checkout.example/c/{}", session_id),
            session_id,
        })
    }

    async fn get_checkout_status(&self, session_id: &str) -> PortResult<CheckoutStatus> {
        let mut inner = self.inner.lock().unwrap();
        inner.status_calls += 1;
        let (status, payment_status) = inner
            .statuses
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Transaction not found".to_string()))?;
        Ok(CheckoutStatus {
            status,
            payment_status,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> PortResult<WebhookEvent> {
        if signature_header != TEST_WEBHOOK_SIGNATURE {
            return Err(PortError::BadRequest(
                "Invalid webhook signature".to_string(),
            ));
        }
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| PortError::BadRequest(format!("Malformed webhook payload: {}", e)))?;
        Ok(WebhookEvent {
            event_type: value["type"].as_str().unwrap_or("unknown").to_string(),
            session_id: value["session_id"].as_str().map(String::from),
            payment_status: value["payment_status"].as_str().map(String::from),
        })
    }
}

//=========================================================================================
// Server Builder and Helpers
//=========================================================================================

pub struct TestContext {
    pub server: TestServer,
    pub store: MemoryStore,
    pub checkout: MockCheckout,
    pub identity: MockIdentity,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: Level::INFO,
        cors_origins: Vec::new(),
        identity_provider_url: String::new(),
        stripe_api_key: None,
        stripe_webhook_secret: None,
        cloudinary_cloud_name: None,
        cloudinary_api_key: None,
        cloudinary_api_secret: None,
        upload_folder: "eiendel".to_string(),
    }
}

fn build_server(with_integrations: bool) -> TestContext {
    let store = MemoryStore::new();
    let checkout = MockCheckout::new();
    let identity = MockIdentity::new();

    let state = Arc::new(AppState {
        db: Arc::new(store.clone()),
        identity: Arc::new(identity.clone()),
        checkout: with_integrations.then(|| {
            Arc::new(checkout.clone()) as Arc<dyn CheckoutService>
        }),
        media: with_integrations.then(|| {
            Arc::new(MediaSigner::new(
                "demo-cloud".to_string(),
                "key-123".to_string(),
                "secret-abc".to_string(),
            ))
        }),
        config: Arc::new(test_config()),
    });

    let server = TestServer::new(build_router(state)).expect("Failed to create test server");

    TestContext {
        server,
        store,
        checkout,
        identity,
    }
}

/// Create a test server with all external integrations mocked in.
pub fn create_test_server() -> TestContext {
    build_server(true)
}

/// Create a test server with the checkout processor and media host left
/// unconfigured, as when their credentials are absent.
pub fn create_test_server_without_integrations() -> TestContext {
    build_server(false)
}

/// Helper to sign a user up and return `(user_id, session_token)`.
pub async fn signup(server: &TestServer, email: &str, password: &str, name: &str) -> (String, String) {
    let response = server
        .post("/api/auth/signup")
        .json(&json!({
            "email": email,
            "password": password,
            "name": name,
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let user_id = body["user_id"].as_str().expect("No user_id").to_string();

    let session_token = response
        .maybe_cookie("session_token")
        .expect("No session cookie")
        .value()
        .to_string();

    (user_id, session_token)
}

/// Builds the session cookie requests authenticate with.
pub fn session_cookie(token: &str) -> cookie::Cookie<'static> {
    cookie::Cookie::new("session_token", token.to_string())
}
