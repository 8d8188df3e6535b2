//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// Default endpoint of the external identity provider's session-exchange API.
const DEFAULT_IDENTITY_PROVIDER_URL: &str =
    "https://demobackend.emergentagent.com/auth/v1/env/oauth/session-data";

/// Default media-host folder uploads are signed into.
const DEFAULT_UPLOAD_FOLDER: &str = "eiendel";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Constructed once in `main` and passed explicitly into each component's
/// constructor; nothing reads the environment after startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Origins allowed to send credentialed cross-site requests.
    pub cors_origins: Vec<String>,
    pub identity_provider_url: String,
    /// Checkout-processor credentials; payment routes answer 503 when absent.
    pub stripe_api_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// Media-host credentials; the signature route answers 503 when absent.
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub upload_folder: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        // --- Load External Integration Settings (credentials as optional) ---
        let identity_provider_url = std::env::var("IDENTITY_PROVIDER_URL")
            .unwrap_or_else(|_| DEFAULT_IDENTITY_PROVIDER_URL.to_string());

        let stripe_api_key = std::env::var("STRIPE_API_KEY").ok();
        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok();

        let cloudinary_cloud_name = std::env::var("CLOUDINARY_CLOUD_NAME").ok();
        let cloudinary_api_key = std::env::var("CLOUDINARY_API_KEY").ok();
        let cloudinary_api_secret = std::env::var("CLOUDINARY_API_SECRET").ok();

        let upload_folder = std::env::var("UPLOAD_FOLDER")
            .unwrap_or_else(|_| DEFAULT_UPLOAD_FOLDER.to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origins,
            identity_provider_url,
            stripe_api_key,
            stripe_webhook_secret,
            cloudinary_cloud_name,
            cloudinary_api_key,
            cloudinary_api_secret,
            upload_folder,
        })
    }
}
