use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use wayfare_catalog::{Attraction, Car, Hotel, Listing, Trip};

pub mod admin;
pub mod error;
pub mod listings;
pub mod middleware;
pub mod state;
pub mod trips;
pub mod wishlist;
pub mod worker;

pub use state::{AppState, AuthConfig, RateLimiter, Repositories};

use listings::{create_listing, delete_listing, get_listing, list_listings, patch_listing};
use middleware::{admin_auth_middleware, customer_auth_middleware, rate_limit_middleware};
use state::ListingAccess;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::IF_MATCH,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .merge(public_routes())
        .merge(admin_routes(&state))
        .merge(customer_routes(&state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::from(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

fn public_listing_routes<L: Listing>(base: &str) -> Router<AppState>
where
    AppState: ListingAccess<L>,
{
    Router::new()
        .route(&format!("/api/{}", base), get(list_listings::<L>))
        .route(&format!("/api/{}/{{id}}", base), get(get_listing::<L>))
}

fn admin_listing_routes<L: Listing>(base: &str) -> Router<AppState>
where
    AppState: ListingAccess<L>,
{
    Router::new()
        .route(&format!("/api/{}", base), post(create_listing::<L>))
        .route(
            &format!("/api/{}/{{id}}", base),
            patch(patch_listing::<L>).delete(delete_listing::<L>),
        )
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .merge(public_listing_routes::<Car>("cars"))
        .merge(public_listing_routes::<Hotel>("hotels"))
        .merge(public_listing_routes::<Attraction>("attractions"))
        .route("/api/trips", get(list_listings::<Trip>))
        .route("/api/trips/{id}", get(trips::get_trip))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(admin_listing_routes::<Car>("cars"))
        .merge(admin_listing_routes::<Hotel>("hotels"))
        .merge(admin_listing_routes::<Attraction>("attractions"))
        .route("/api/trips", post(create_listing::<Trip>))
        .route(
            "/api/trips/{id}",
            patch(patch_listing::<Trip>)
                .put(trips::replace_trip)
                .delete(trips::delete_trip),
        )
        .route("/api/admin/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/api/admin/users/{id}",
            get(admin::get_user).patch(admin::patch_user).delete(admin::delete_user),
        )
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware))
}

fn customer_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/wishlist",
            get(wishlist::list_wishlist).post(wishlist::add_to_wishlist),
        )
        .route(
            "/api/wishlist/{item_type}/{item_id}",
            axum::routing::delete(wishlist::remove_from_wishlist),
        )
        .route("/api/trips/{id}/reviews", post(trips::add_review))
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware))
}
