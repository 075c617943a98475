pub mod events;
pub mod repository;
pub mod listings;
pub mod trips;
pub mod wishlist;
pub mod users;
pub mod outbox;
pub mod memory;

use wayfare_catalog::CatalogError;

pub use listings::{ListingManager, PatchListingCommand};
pub use trips::{AddReviewCommand, ReplaceMode, TripCoordinator, UpdateTripCommand};
pub use wishlist::WishlistManager;
pub use users::{NewUser, User, UserManager, UserPatch, UserRole};
pub use outbox::{DrainResult, OutboxRelay};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

/// Optimistic concurrency check for commands that carry the version the
/// client last saw.
pub(crate) fn ensure_version(
    what: &str,
    id: impl std::fmt::Display,
    current: i64,
    expected: Option<i64>,
) -> CoreResult<()> {
    match expected {
        Some(expected) if expected != current => Err(CoreError::Conflict(format!(
            "{} {} is at version {}, request expected {}",
            what, id, current, expected
        ))),
        _ => Ok(()),
    }
}
