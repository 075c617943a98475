use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;
use uuid::Uuid;
use wayfare_core::{NewUser, User, UserPatch};

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

// ============================================================================
// User Management Handlers
// ============================================================================

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list().await?))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users.create(req).await?;
    info!("Admin {} created user {}", claims.sub, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/admin/users/{id}
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get(id).await?))
}

/// PATCH /api/admin/users/{id}
pub async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    if claims.sub == id.to_string() && patch.is_locked.as_set() == Some(&true) {
        return Err(AppError::ValidationError("Administrators cannot lock themselves out".to_string()));
    }
    Ok(Json(state.users.patch(id, patch).await?))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, AppError> {
    state.users.delete(id).await?;
    info!("Admin {} deleted user {}", claims.sub, id);
    Ok(StatusCode::NO_CONTENT)
}
