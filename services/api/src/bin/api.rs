//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, IdentityProviderAdapter, MediaSigner, StripeCheckoutAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState, ApiDoc},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use eiendel_core::ports::CheckoutService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize External-Service Adapters ---
    let identity_adapter = Arc::new(IdentityProviderAdapter::new(
        config.identity_provider_url.clone(),
    ));

    // Payment and upload-signing credentials are optional; without them
    // the affected routes answer 503 instead of the process refusing to
    // start.
    let checkout_adapter: Option<Arc<dyn CheckoutService>> =
        config.stripe_api_key.as_ref().map(|api_key| {
            Arc::new(StripeCheckoutAdapter::new(
                api_key.clone(),
                config.stripe_webhook_secret.clone(),
            )) as Arc<dyn CheckoutService>
        });
    if checkout_adapter.is_none() {
        warn!("STRIPE_API_KEY is not set; payment routes will answer 503");
    }

    let media_signer = match (
        &config.cloudinary_cloud_name,
        &config.cloudinary_api_key,
        &config.cloudinary_api_secret,
    ) {
        (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(Arc::new(MediaSigner::new(
            cloud_name.clone(),
            api_key.clone(),
            api_secret.clone(),
        ))),
        _ => {
            warn!("Media host credentials are not set; upload signing will answer 503");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        identity: identity_adapter,
        checkout: checkout_adapter,
        media: media_signer,
        config: config.clone(),
    });

    // --- 5. Build the CORS Policy ---
    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let app = build_router(app_state)
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
