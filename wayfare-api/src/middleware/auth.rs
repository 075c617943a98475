use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use wayfare_core::{CoreError, UserRole};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims issued by the identity provider. `sub` is the user id the
/// wishlist and reviews are recorded under.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

fn verify(state: &AppState, bearer: Option<TypedHeader<Authorization<Bearer>>>) -> Result<Claims, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let mut validation = Validation::default();
    if let Some(issuer) = &state.auth.issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid token".to_string())
    })?;

    Ok(token_data.claims)
}

/// Accounts locked by an administrator lose access even with a valid token.
async fn ensure_not_locked(state: &AppState, claims: &Claims) -> Result<(), AppError> {
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        debug!("Subject {} is not a managed account, skipping lock check", claims.sub);
        return Ok(());
    };
    match state.users.get(user_id).await {
        Ok(user) if user.is_locked => Err(AppError::AuthorizationError("Account is locked".to_string())),
        Ok(_) | Err(CoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify(&state, bearer)?;
    if claims.role != UserRole::Customer {
        return Err(AppError::AuthorizationError("Customer account required".to_string()));
    }
    ensure_not_locked(&state, &claims).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify(&state, bearer)?;
    if claims.role != UserRole::Admin {
        return Err(AppError::AuthorizationError("Administrator role required".to_string()));
    }
    ensure_not_locked(&state, &claims).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
