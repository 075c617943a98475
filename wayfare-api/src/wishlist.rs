use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use wayfare_catalog::{ListingKind, WishlistItem};

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddWishlistRequest {
    pub item_id: i64,
    pub item_type: String,
}

/// GET /api/wishlist
pub async fn list_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WishlistItem>>, AppError> {
    Ok(Json(state.wishlist.list(&claims.sub).await?))
}

/// POST /api/wishlist
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddWishlistRequest>,
) -> Result<(StatusCode, Json<WishlistItem>), AppError> {
    let item_type: ListingKind = req.item_type.parse()?;
    let item = state.wishlist.add(&claims.sub, req.item_id, item_type).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/wishlist/{item_type}/{item_id}
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((item_type, item_id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    let item_type: ListingKind = item_type.parse()?;
    state.wishlist.remove(&claims.sub, item_id, item_type).await?;
    Ok(StatusCode::NO_CONTENT)
}
