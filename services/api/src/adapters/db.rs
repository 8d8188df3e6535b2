//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eiendel_core::domain::{
    self, AuthSession, Item, ItemDraft, ItemPatch, PaymentStatus, PaymentTransaction, User,
    UserCredentials, DEFAULT_CURRENCY,
};
use eiendel_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Postgres reports a violated unique constraint as SQLSTATE 23505.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: String,
    email: String,
    name: String,
    picture: Option<String>,
    subscription_status: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            picture: self.picture,
            subscription_status: self.subscription_status,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: String,
    email: String,
    name: String,
    picture: Option<String>,
    password_hash: Option<String>,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            picture: self.picture,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    session_token: String,
    user_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            session_token: self.session_token,
            user_id: self.user_id,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ItemRecord {
    item_id: String,
    user_id: String,
    navn: String,
    kategori: Option<String>,
    serienummer: Option<String>,
    notat: Option<String>,
    verdi: Option<f64>,
    valuta: String,
    vedlegg_urls: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ItemRecord {
    fn to_domain(self) -> Item {
        Item {
            item_id: self.item_id,
            user_id: self.user_id,
            navn: self.navn,
            kategori: self.kategori,
            serienummer: self.serienummer,
            notat: self.notat,
            verdi: self.verdi,
            valuta: self.valuta,
            vedlegg_urls: self.vedlegg_urls,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TransactionRecord {
    transaction_id: String,
    session_id: String,
    user_id: String,
    package_id: String,
    amount: f64,
    currency: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}
impl TransactionRecord {
    fn to_domain(self) -> PortResult<PaymentTransaction> {
        let payment_status = match self.payment_status.as_str() {
            "pending" => PaymentStatus::Pending,
            "paid" => PaymentStatus::Paid,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Invalid payment status in store: {}",
                    other
                )))
            }
        };
        Ok(PaymentTransaction {
            transaction_id: self.transaction_id,
            session_id: self.session_id,
            user_id: self.user_id,
            package_id: self.package_id,
            amount: self.amount,
            currency: self.currency,
            payment_status,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_password(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let record: UserRecord = sqlx::query_as(
            "INSERT INTO users (user_id, email, name, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING user_id, email, name, picture, subscription_status, created_at",
        )
        .bind(domain::new_user_id())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Email already registered".to_string())
            } else {
                PortError::Unexpected(e.to_string())
            }
        })?;

        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record: CredentialsRecord = sqlx::query_as(
            "SELECT user_id, email, name, picture, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("User not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        let record: UserRecord = sqlx::query_as(
            "SELECT user_id, email, name, picture, subscription_status, created_at \
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("User not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn sync_external_user(
        &self,
        email: &str,
        name: &str,
        picture: Option<&str>,
    ) -> PortResult<User> {
        // Upsert keyed on email: first provider login creates the account,
        // later logins refresh the profile fields. The existing user_id is
        // preserved on the conflict path.
        let record: UserRecord = sqlx::query_as(
            "INSERT INTO users (user_id, email, name, picture, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, picture = EXCLUDED.picture \
             RETURNING user_id, email, name, picture, subscription_status, created_at",
        )
        .bind(domain::new_user_id())
        .bind(email)
        .bind(name)
        .bind(picture)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn activate_subscription(&self, user_id: &str) -> PortResult<()> {
        sqlx::query(
            "UPDATE users SET subscription_status = 'active', subscription_started_at = $2 \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_session(
        &self,
        session_token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_sessions (session_token, user_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_token)
        .bind(user_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, session_token: &str) -> PortResult<AuthSession> {
        let record: SessionRecord = sqlx::query_as(
            "SELECT session_token, user_id, expires_at, created_at \
             FROM user_sessions WHERE session_token = $1",
        )
        .bind(session_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Session not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn delete_session(&self, session_token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE session_token = $1")
            .bind(session_token)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn list_items(&self, owner: &str) -> PortResult<Vec<Item>> {
        let records: Vec<ItemRecord> = sqlx::query_as(
            "SELECT item_id, user_id, navn, kategori, serienummer, notat, verdi, valuta, \
             vedlegg_urls, created_at, updated_at \
             FROM items WHERE user_id = $1",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_item(&self, owner: &str, draft: ItemDraft) -> PortResult<Item> {
        let now = Utc::now();
        let record: ItemRecord = sqlx::query_as(
            "INSERT INTO items (item_id, user_id, navn, kategori, serienummer, notat, verdi, \
             valuta, vedlegg_urls, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
             RETURNING item_id, user_id, navn, kategori, serienummer, notat, verdi, valuta, \
             vedlegg_urls, created_at, updated_at",
        )
        .bind(domain::new_item_id())
        .bind(owner)
        .bind(draft.navn)
        .bind(draft.kategori)
        .bind(draft.serienummer)
        .bind(draft.notat)
        .bind(draft.verdi)
        .bind(draft.valuta.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
        .bind(draft.vedlegg_urls.unwrap_or_default())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn get_item(&self, owner: &str, item_id: &str) -> PortResult<Item> {
        // Scoping the lookup by owner makes a foreign item indistinguishable
        // from an absent one.
        let record: ItemRecord = sqlx::query_as(
            "SELECT item_id, user_id, navn, kategori, serienummer, notat, verdi, valuta, \
             vedlegg_urls, created_at, updated_at \
             FROM items WHERE item_id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Item not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn update_item(&self, owner: &str, item_id: &str, patch: ItemPatch) -> PortResult<Item> {
        // Merge-patch in one statement: a NULL bind leaves the stored value
        // in place, while updated_at is refreshed unconditionally.
        let record: ItemRecord = sqlx::query_as(
            "UPDATE items SET \
             navn = COALESCE($3, navn), \
             kategori = COALESCE($4, kategori), \
             serienummer = COALESCE($5, serienummer), \
             notat = COALESCE($6, notat), \
             verdi = COALESCE($7, verdi), \
             valuta = COALESCE($8, valuta), \
             vedlegg_urls = COALESCE($9, vedlegg_urls), \
             updated_at = $10 \
             WHERE item_id = $1 AND user_id = $2 \
             RETURNING item_id, user_id, navn, kategori, serienummer, notat, verdi, valuta, \
             vedlegg_urls, created_at, updated_at",
        )
        .bind(item_id)
        .bind(owner)
        .bind(patch.navn)
        .bind(patch.kategori)
        .bind(patch.serienummer)
        .bind(patch.notat)
        .bind(patch.verdi)
        .bind(patch.valuta)
        .bind(patch.vedlegg_urls)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Item not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn delete_item(&self, owner: &str, item_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE item_id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Item not found".to_string()));
        }
        Ok(())
    }

    async fn create_transaction(&self, txn: PaymentTransaction) -> PortResult<PaymentTransaction> {
        let record: TransactionRecord = sqlx::query_as(
            "INSERT INTO payment_transactions (transaction_id, session_id, user_id, package_id, \
             amount, currency, payment_status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING transaction_id, session_id, user_id, package_id, amount, currency, \
             payment_status, created_at, completed_at",
        )
        .bind(txn.transaction_id)
        .bind(txn.session_id)
        .bind(txn.user_id)
        .bind(txn.package_id)
        .bind(txn.amount)
        .bind(txn.currency)
        .bind(txn.payment_status.as_str())
        .bind(txn.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn get_transaction(
        &self,
        owner: &str,
        session_id: &str,
    ) -> PortResult<PaymentTransaction> {
        let record: TransactionRecord = sqlx::query_as(
            "SELECT transaction_id, session_id, user_id, package_id, amount, currency, \
             payment_status, created_at, completed_at \
             FROM payment_transactions WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Transaction not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        record.to_domain()
    }

    async fn get_transaction_by_session(
        &self,
        session_id: &str,
    ) -> PortResult<PaymentTransaction> {
        let record: TransactionRecord = sqlx::query_as(
            "SELECT transaction_id, session_id, user_id, package_id, amount, currency, \
             payment_status, created_at, completed_at \
             FROM payment_transactions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Transaction not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        record.to_domain()
    }

    async fn mark_transaction_paid(&self, session_id: &str) -> PortResult<bool> {
        // The status guard makes the pending->paid transition single-shot
        // even when a status poll and a webhook race each other.
        let result = sqlx::query(
            "UPDATE payment_transactions SET payment_status = 'paid', completed_at = $2 \
             WHERE session_id = $1 AND payment_status <> 'paid'",
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
