use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use wayfare_api::middleware::Claims;
use wayfare_api::{app, AppState, AuthConfig, Repositories};
use wayfare_core::memory::RecordingPublisher;
use wayfare_core::{OutboxRelay, UserRole};
use wayfare_shared::VectorSyncEvent;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    repos: Repositories,
}

impl TestApp {
    fn new() -> Self {
        let repos = Repositories::in_memory();
        let state = AppState::new(
            &repos,
            AuthConfig {
                secret: SECRET.to_string(),
                issuer: None,
            },
        );
        Self { router: app(state), repos }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn published(&self) -> Vec<VectorSyncEvent> {
        let publisher = RecordingPublisher::new();
        OutboxRelay::new()
            .drain(self.repos.outbox.as_ref(), &publisher)
            .await
            .unwrap();
        publisher.published().await
    }
}

fn token(sub: &str, role: UserRole) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
        role,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iss: None,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn admin() -> String {
    token("admin-1", UserRole::Admin)
}

fn customer(sub: &str) -> String {
    token(sub, UserRole::Customer)
}

fn car_body() -> Value {
    json!({
        "name": "Compact",
        "brand": "Toyota",
        "model": "Yaris",
        "year": 2022,
        "city": "Madrid",
        "price_per_day_cents": 3500,
        "seats": 5,
        "status": "Available"
    })
}

fn trip_body() -> Value {
    json!({
        "title": "Douro Valley",
        "description": "Wine and river",
        "city": "Porto",
        "price_cents": 89000,
        "duration_days": 3,
        "itinerary": [
            {"day_number": 1, "title": "Arrival", "activities": [{"time": "18:00", "title": "Port tasting"}]},
            {"day_number": 2, "title": "River cruise"}
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_patch_syncs_featured_flags_and_keeps_other_fields() {
    let app = TestApp::new();
    let admin = admin();
    let (status, car) = app.send("POST", "/api/cars", Some(admin.as_str()), Some(car_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(car["featured"], false);
    assert_eq!(car["is_featured"], false);
    let uri = format!("/api/cars/{}", car["id"]);

    let (status, patched) = app.send("PATCH", &uri, Some(admin.as_str()), Some(json!({"featured": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["featured"], true);
    assert_eq!(patched["is_featured"], true);
    assert_eq!(patched["name"], "Compact");
    assert_eq!(patched["status"], "Available");
    assert_eq!(patched["version"], 2);

    // is_featured is applied last
    let (_, patched) = app
        .send("PATCH", &uri, Some(admin.as_str()), Some(json!({"featured": true, "is_featured": false})))
        .await;
    assert_eq!(patched["featured"], false);
    assert_eq!(patched["is_featured"], false);

    let (_, cleared) = app.send("PATCH", &uri, Some(admin.as_str()), Some(json!({"status": null}))).await;
    assert_eq!(cleared["status"], Value::Null);
    assert_eq!(cleared["price_per_day_cents"], 3500);

    let (_, fetched) = app.send("GET", &uri, None, None).await;
    assert_eq!(fetched, cleared);
}

#[tokio::test]
async fn test_patch_rejections() {
    let app = TestApp::new();
    let admin = admin();
    let (_, car) = app.send("POST", "/api/cars", Some(admin.as_str()), Some(car_body())).await;
    let uri = format!("/api/cars/{}", car["id"]);

    let (status, _) = app.send("PATCH", &uri, Some(admin.as_str()), Some(json!({"colour": "red"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.send("PATCH", "/api/cars/999", Some(admin.as_str()), Some(json!({"seats": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stale = format!("{}?expected_version=7", uri);
    let (status, body) = app.send("PATCH", &stale, Some(admin.as_str()), Some(json!({"seats": 2}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("version"));

    let (status, _) = app.send("PATCH", &uri, Some(admin.as_str()), Some(json!({"seats": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = app.send("GET", &uri, None, None).await;
    assert_eq!(unchanged["seats"], 5);
    assert_eq!(unchanged["version"], 1);
}

#[tokio::test]
async fn test_mutations_require_admin() {
    let app = TestApp::new();

    let (status, _) = app.send("POST", "/api/hotels", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("POST", "/api/cars", Some("not-a-jwt"), Some(car_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("POST", "/api/cars", Some(customer("cust-1").as_str()), Some(car_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", "/api/wishlist", Some(admin().as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/api/cars", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_listing_filters() {
    let app = TestApp::new();
    let admin = admin();
    for (name, featured) in [("Plaza", true), ("Inn", false)] {
        let body = json!({
            "name": name,
            "city": "Seville",
            "address": "Calle 1",
            "stars": 4,
            "price_per_night_cents": 12000,
            "featured": featured
        });
        let (status, _) = app.send("POST", "/api/hotels", Some(admin.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, featured) = app.send("GET", "/api/hotels?featured=true", None, None).await;
    assert_eq!(featured.as_array().unwrap().len(), 1);
    assert_eq!(featured[0]["name"], "Plaza");

    let (_, page) = app.send("GET", "/api/hotels?page=2&page_size=1", None, None).await;
    assert_eq!(page[0]["name"], "Inn");
}

#[tokio::test]
async fn test_trip_replace_keeps_reviews_and_delete_cascades() {
    let app = TestApp::new();
    let admin = admin();
    let cust = customer("cust-9");

    let (status, trip) = app.send("POST", "/api/trips", Some(admin.as_str()), Some(trip_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = trip["id"].as_i64().unwrap();
    let uri = format!("/api/trips/{}", id);

    let (status, review) = app
        .send("POST", &format!("{}/reviews", uri), Some(cust.as_str()), Some(json!({"rating": 5, "comment": "Superb"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["user_id"], "cust-9");

    let (status, _) = app
        .send("POST", &format!("{}/reviews", uri), Some(cust.as_str()), Some(json!({"rating": 9})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut replacement = trip_body();
    replacement["title"] = json!("Douro Valley Deluxe");
    replacement["itinerary"] = json!([{"day_number": 3, "title": "Farewell lunch"}]);
    let (status, replaced) = app.send("PUT", &uri, Some(admin.as_str()), Some(replacement)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["title"], "Douro Valley Deluxe");

    let (_, full) = app.send("GET", &uri, None, None).await;
    assert_eq!(full["itinerary"].as_array().unwrap().len(), 1);
    assert_eq!(full["itinerary"][0]["day_number"], 3);
    assert_eq!(full["user_reviews"].as_array().unwrap().len(), 1);
    assert_eq!(full["average_rating"], 5.0);

    let (status, _) = app
        .send("POST", "/api/wishlist", Some(cust.as_str()), Some(json!({"item_id": id, "item_type": "trip"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.send("DELETE", &uri, Some(admin.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, wishlist) = app.send("GET", "/api/wishlist", Some(cust.as_str()), None).await;
    assert_eq!(wishlist, json!([]));

    let deletions: Vec<String> = app
        .published()
        .await
        .iter()
        .filter(|e| e.event_type() == "ENTITY_DELETED")
        .map(|e| e.key())
        .collect();
    assert_eq!(deletions, vec![format!("Trip:{}", id)]);

    let (status, _) = app.send("DELETE", &uri, Some(admin.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wishlist_add_is_idempotent_and_remove_reports_missing() {
    let app = TestApp::new();
    let cust = customer("cust-3");
    let (_, car) = app.send("POST", "/api/cars", Some(admin().as_str()), Some(car_body())).await;
    let add = json!({"item_id": car["id"], "item_type": "Car"});

    let (_, first) = app.send("POST", "/api/wishlist", Some(cust.as_str()), Some(add.clone())).await;
    let (_, second) = app.send("POST", "/api/wishlist", Some(cust.as_str()), Some(add)).await;
    assert_eq!(first["id"], second["id"]);

    let (status, _) = app
        .send("POST", "/api/wishlist", Some(cust.as_str()), Some(json!({"item_id": 1, "item_type": "boats"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/wishlist/cars/{}", car["id"]);
    let (status, _) = app.send("DELETE", &uri, Some(cust.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("DELETE", &uri, Some(cust.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new();
    let admin = admin();

    let (status, user) = app
        .send(
            "POST",
            "/api/admin/users",
            Some(admin.as_str()),
            Some(json!({"email": " Ana@Example.com ", "display_name": "Ana"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "ana@example.com");
    assert_eq!(user["role"], "CUSTOMER");

    let (status, _) = app
        .send(
            "POST",
            "/api/admin/users",
            Some(admin.as_str()),
            Some(json!({"email": "ana@example.com", "display_name": "Other"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let user_id = user["id"].as_str().unwrap().to_string();
    let (status, locked) = app
        .send("PATCH", &format!("/api/admin/users/{}", user_id), Some(admin.as_str()), Some(json!({"is_locked": true})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["is_locked"], true);
    assert_eq!(locked["display_name"], "Ana");

    // the locked account's own token is refused
    let (status, _) = app.send("GET", "/api/wishlist", Some(customer(&user_id).as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, users) = app.send("GET", "/api/admin/users", Some(admin.as_str()), None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);

    let (status, _) = app.send("DELETE", &format!("/api/admin/users/{}", user_id), Some(admin.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &format!("/api/admin/users/{}", user_id), Some(admin.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lock_check_only_applies_to_managed_accounts() {
    let app = TestApp::new();

    // subjects issued for accounts outside the user store are not lock-checked
    let (status, body) = app.send("GET", "/api/wishlist", Some(customer("idp|42").as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let unknown = uuid::Uuid::new_v4().to_string();
    let (status, _) = app.send("GET", "/api/wishlist", Some(customer(&unknown).as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
}
