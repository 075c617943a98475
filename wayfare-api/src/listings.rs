use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use wayfare_catalog::Listing;
use wayfare_core::repository::ListingQuery;
use wayfare_core::PatchListingCommand;

use crate::error::AppError;
use crate::state::{AppState, ListingAccess};

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub expected_version: Option<i64>,
}

/// Serializes a listing for the wire. Kinds that historically carried both
/// flags get `is_featured` mirrored from the stored `featured`.
pub fn listing_body<L: Listing>(listing: &L) -> Result<Value, AppError> {
    let mut body = serde_json::to_value(listing)?;
    if L::PAIRED_FEATURED_FLAG {
        if let Some(fields) = body.as_object_mut() {
            fields.insert("is_featured".to_string(), Value::Bool(listing.is_featured()));
        }
    }
    Ok(body)
}

/// Version the client last saw: `?expected_version=` wins over `If-Match`.
pub fn expected_version(query: &VersionQuery, headers: &HeaderMap) -> Result<Option<i64>, AppError> {
    if query.expected_version.is_some() {
        return Ok(query.expected_version);
    }
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };

    raw.to_str()
        .ok()
        .map(|v| v.trim().trim_start_matches("W/").trim_matches('"'))
        .and_then(|v| v.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| AppError::ValidationError("If-Match must carry a numeric version".to_string()))
}

/// GET /api/{kind}
pub async fn list_listings<L: Listing>(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Value>>, AppError>
where
    AppState: ListingAccess<L>,
{
    let listings = ListingAccess::<L>::listings(&state).list(&query).await?;
    let body = listings.iter().map(listing_body::<L>).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

/// GET /api/{kind}/{id}
pub async fn get_listing<L: Listing>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError>
where
    AppState: ListingAccess<L>,
{
    let listing = ListingAccess::<L>::listings(&state).get(id).await?;
    Ok(Json(listing_body(&listing)?))
}

/// POST /api/{kind}
pub async fn create_listing<L: Listing>(
    State(state): State<AppState>,
    Json(draft): Json<L::Draft>,
) -> Result<(StatusCode, Json<Value>), AppError>
where
    AppState: ListingAccess<L>,
{
    let listing = ListingAccess::<L>::listings(&state).create(draft).await?;
    Ok((StatusCode::CREATED, Json(listing_body(&listing)?)))
}

/// PATCH /api/{kind}/{id}
///
/// Only the fields present in the body change. An explicit `null` clears a
/// nullable field; unknown fields are rejected.
pub async fn patch_listing<L: Listing>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(version): Query<VersionQuery>,
    headers: HeaderMap,
    Json(patch): Json<L::Patch>,
) -> Result<Json<Value>, AppError>
where
    AppState: ListingAccess<L>,
{
    let cmd = PatchListingCommand {
        id,
        patch,
        expected_version: expected_version(&version, &headers)?,
    };
    let listing = ListingAccess::<L>::listings(&state).patch(cmd).await?;
    Ok(Json(listing_body(&listing)?))
}

/// DELETE /api/{kind}/{id}
pub async fn delete_listing<L: Listing>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError>
where
    AppState: ListingAccess<L>,
{
    ListingAccess::<L>::listings(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
