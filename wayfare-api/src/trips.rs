use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use wayfare_catalog::{TripDraft, UserReview};
use wayfare_core::{AddReviewCommand, UpdateTripCommand};

use crate::error::AppError;
use crate::listings::{expected_version, listing_body, VersionQuery};
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

/// GET /api/trips/{id}, with reviews, itinerary and activities.
pub async fn get_trip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, AppError> {
    let trip = state.trip_coordinator.get(id).await?;
    let mut body = listing_body(&trip)?;
    if let Some(fields) = body.as_object_mut() {
        fields.insert("average_rating".to_string(), serde_json::json!(trip.average_rating()));
    }
    Ok(Json(body))
}

/// PUT /api/trips/{id}
///
/// Replaces every scalar field and the whole itinerary. Reviews stay.
pub async fn replace_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(version): Query<VersionQuery>,
    headers: HeaderMap,
    Json(data): Json<TripDraft>,
) -> Result<Json<Value>, AppError> {
    let trip = state
        .trip_coordinator
        .update(UpdateTripCommand {
            id,
            data,
            expected_version: expected_version(&version, &headers)?,
        })
        .await?;
    Ok(Json(listing_body(&trip)?))
}

/// DELETE /api/trips/{id}
pub async fn delete_trip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.trip_coordinator.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/trips/{id}/reviews
pub async fn add_review(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<UserReview>), AppError> {
    let review = state
        .trip_coordinator
        .add_review(AddReviewCommand {
            trip_id,
            user_id: claims.sub,
            rating: req.rating,
            comment: req.comment,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
