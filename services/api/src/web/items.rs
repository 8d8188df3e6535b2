//! services/api/src/web/items.rs
//!
//! CRUD endpoints for inventory items. Every operation is scoped to the
//! authenticated owner; an item someone else owns answers exactly like an
//! item that does not exist.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use eiendel_core::domain::{Item, ItemDraft, ItemPatch, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::state::AppState;
use crate::web::{port_error_response, MessageResponse};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub navn: String,
    pub kategori: Option<String>,
    pub serienummer: Option<String>,
    pub notat: Option<String>,
    pub verdi: Option<f64>,
    pub valuta: Option<String>,
    pub vedlegg_urls: Option<Vec<String>>,
}

/// A merge-patch body: omitted fields leave the stored value untouched.
#[derive(Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub navn: Option<String>,
    pub kategori: Option<String>,
    pub serienummer: Option<String>,
    pub notat: Option<String>,
    pub verdi: Option<f64>,
    pub valuta: Option<String>,
    pub vedlegg_urls: Option<Vec<String>>,
}

#[derive(Serialize, ToSchema)]
pub struct ItemResponse {
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

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.item_id,
            user_id: item.user_id,
            navn: item.navn,
            kategori: item.kategori,
            serienummer: item.serienummer,
            notat: item.notat,
            verdi: item.verdi,
            valuta: item.valuta,
            vedlegg_urls: item.vedlegg_urls,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/items - List the caller's items
#[utoipa::path(
    get,
    path = "/api/items",
    responses(
        (status = 200, description = "All items owned by the caller", body = [ItemResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_items_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let items = state
        .db
        .list_items(&user.user_id)
        .await
        .map_err(|e| port_error_response("Failed to list items", e))?;

    let response: Vec<ItemResponse> = items.into_iter().map(ItemResponse::from).collect();
    Ok(Json(response))
}

/// POST /api/items - Create a new item
#[utoipa::path(
    post,
    path = "/api/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = ItemDraft {
        navn: req.navn,
        kategori: req.kategori,
        serienummer: req.serienummer,
        notat: req.notat,
        verdi: req.verdi,
        valuta: req.valuta,
        vedlegg_urls: req.vedlegg_urls,
    };

    let item = state
        .db
        .create_item(&user.user_id, draft)
        .await
        .map_err(|e| port_error_response("Failed to create item", e))?;

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// GET /api/items/{item_id} - Fetch one item
#[utoipa::path(
    get,
    path = "/api/items/{item_id}",
    params(("item_id" = String, Path, description = "The item's opaque id")),
    responses(
        (status = 200, description = "The item", body = ItemResponse),
        (status = 404, description = "Item absent or owned by someone else")
    )
)]
pub async fn get_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let item = state
        .db
        .get_item(&user.user_id, &item_id)
        .await
        .map_err(|e| port_error_response("Failed to get item", e))?;

    Ok(Json(ItemResponse::from(item)))
}

/// PUT /api/items/{item_id} - Merge-patch one item
#[utoipa::path(
    put,
    path = "/api/items/{item_id}",
    request_body = UpdateItemRequest,
    params(("item_id" = String, Path, description = "The item's opaque id")),
    responses(
        (status = 200, description = "The updated item", body = ItemResponse),
        (status = 404, description = "Item absent or owned by someone else")
    )
)]
pub async fn update_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let patch = ItemPatch {
        navn: req.navn,
        kategori: req.kategori,
        serienummer: req.serienummer,
        notat: req.notat,
        verdi: req.verdi,
        valuta: req.valuta,
        vedlegg_urls: req.vedlegg_urls,
    };

    let item = state
        .db
        .update_item(&user.user_id, &item_id, patch)
        .await
        .map_err(|e| port_error_response("Failed to update item", e))?;

    Ok(Json(ItemResponse::from(item)))
}

/// DELETE /api/items/{item_id} - Delete one item
#[utoipa::path(
    delete,
    path = "/api/items/{item_id}",
    params(("item_id" = String, Path, description = "The item's opaque id")),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 404, description = "Item absent or owned by someone else")
    )
)]
pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .delete_item(&user.user_id, &item_id)
        .await
        .map_err(|e| port_error_response("Failed to delete item", e))?;

    Ok(Json(MessageResponse {
        message: "Item deleted".to_string(),
    }))
}
