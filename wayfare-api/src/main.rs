use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfare_api::{app, worker, AppState, AuthConfig, RateLimiter, Repositories};
use wayfare_core::repository::EventPublisher;
use wayfare_core::OutboxRelay;
use wayfare_store::app_config::{Config, KafkaConfig};
use wayfare_store::{DbClient, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfare_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Wayfare API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let repos = Repositories::postgres(&db);

    let mut app_state = AppState::new(
        &repos,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            issuer: config.auth.issuer.clone(),
        },
    )
    .with_allowed_origins(config.server.cors_origins.clone());

    match &config.redis {
        Some(redis) => match RedisClient::new(&redis.url) {
            Ok(client) => {
                app_state = app_state.with_rate_limit(RateLimiter {
                    redis: Arc::new(client),
                    requests_per_window: config.rate_limit.requests_per_window,
                    window_seconds: config.rate_limit.window_seconds,
                });
            }
            Err(e) => tracing::warn!("Redis unavailable, rate limiting disabled: {}", e),
        },
        None => tracing::info!("No Redis configured, rate limiting disabled"),
    }

    let relay = OutboxRelay::new()
        .with_batch_size(config.outbox.batch_size)
        .with_max_attempts(config.outbox.max_attempts)
        .with_lease(Duration::from_secs(config.outbox.lease_seconds));
    tokio::spawn(worker::start_outbox_worker(
        repos.outbox.clone(),
        event_publisher(&config.kafka),
        relay,
        Duration::from_millis(config.outbox.poll_interval_ms),
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn event_publisher(kafka: &KafkaConfig) -> Arc<dyn EventPublisher> {
    match wayfare_store::KafkaEventPublisher::new(kafka) {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            tracing::warn!("Kafka producer unavailable, events will only be logged: {}", e);
            Arc::new(wayfare_core::events::TracingPublisher)
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn event_publisher(kafka: &KafkaConfig) -> Arc<dyn EventPublisher> {
    tracing::info!(
        "Built without Kafka support; events for topic {} will only be logged",
        kafka.topic
    );
    Arc::new(wayfare_core::events::TracingPublisher)
}
