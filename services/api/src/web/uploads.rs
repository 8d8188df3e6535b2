//! services/api/src/web/uploads.rs
//!
//! Issues short-lived signatures so an authenticated client can upload
//! attachments directly to the media host.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::adapters::SignedUploadParams;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignatureQuery {
    /// `image` or `raw`; anything else is rejected.
    pub resource_type: Option<String>,
    pub folder: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SignatureResponse {
    pub signature: String,
    pub timestamp: i64,
    pub cloud_name: String,
    pub api_key: String,
    pub folder: String,
    pub resource_type: String,
}

impl From<SignedUploadParams> for SignatureResponse {
    fn from(params: SignedUploadParams) -> Self {
        Self {
            signature: params.signature,
            timestamp: params.timestamp,
            cloud_name: params.cloud_name,
            api_key: params.api_key,
            folder: params.folder,
            resource_type: params.resource_type,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/upload/signature - Sign parameters for a direct upload
#[utoipa::path(
    get,
    path = "/api/upload/signature",
    params(
        ("resource_type" = Option<String>, Query, description = "image (default) or raw"),
        ("folder" = Option<String>, Query, description = "Target folder on the media host")
    ),
    responses(
        (status = 200, description = "Signed upload parameters", body = SignatureResponse),
        (status = 400, description = "Unsupported resource type"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Media host not configured")
    )
)]
pub async fn upload_signature_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignatureQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let resource_type = query.resource_type.unwrap_or_else(|| "image".to_string());
    if resource_type != "image" && resource_type != "raw" {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid resource type".to_string(),
        ));
    }

    let folder = query
        .folder
        .unwrap_or_else(|| state.config.upload_folder.clone());

    let signer = state.media.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Media host is not configured".to_string(),
    ))?;

    let signed = signer.sign_upload(&resource_type, &folder, Utc::now().timestamp());
    Ok(Json(SignatureResponse::from(signed)))
}
