pub mod app_config;
pub mod database;
pub mod listing_repo;
pub mod trip_repo;
pub mod wishlist_repo;
pub mod user_repo;
pub mod outbox_repo;
pub mod redis_repo;
pub mod events;

pub use app_config::Config;
pub use database::DbClient;
pub use listing_repo::PgListingRepository;
pub use trip_repo::PgTripRepository;
pub use wishlist_repo::PgWishlistRepository;
pub use user_repo::PgUserRepository;
pub use outbox_repo::PgEventOutbox;
pub use redis_repo::RedisClient;
#[cfg(feature = "kafka")]
pub use events::KafkaEventPublisher;

use wayfare_core::CoreError;

pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    tracing::error!("Database error: {}", err);
    CoreError::InternalError(format!("Database error: {}", err))
}
