use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;
use wayfare_catalog::{Listing, ListingKind, Trip, WishlistItem};
use wayfare_shared::VectorSyncEvent;

use crate::users::User;
use crate::CoreResult;

/// Filter and paging descriptor for listing queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub featured: Option<bool>,
    pub city: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListingQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn limit(&self) -> u32 {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page.unwrap_or(1).max(1) - 1) * self.limit()
    }

    pub fn matches<L: Listing>(&self, listing: &L) -> bool {
        if let Some(featured) = self.featured {
            if listing.is_featured() != featured {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !listing.city().eq_ignore_ascii_case(city) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if listing.status() != Some(status.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Which owned collections of a trip to load (and, on save, to write back).
/// The itinerary always travels with its nested activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripInclude {
    pub reviews: bool,
    pub itinerary: bool,
}

impl TripInclude {
    pub fn all() -> Self {
        Self { reviews: true, itinerary: true }
    }

    pub fn reviews() -> Self {
        Self { reviews: true, itinerary: false }
    }
}

/// Storage for a listing kind. Reads return scalar fields only; a trip's
/// owned collections come back empty from here.
#[async_trait]
pub trait ListingRepository<L: Listing>: Send + Sync {
    /// Assigns an id and version 1.
    async fn insert(&self, listing: L) -> CoreResult<L>;

    async fn get(&self, id: i64) -> CoreResult<Option<L>>;

    async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<L>>;

    /// Writes scalar fields back. `listing.version()` must match the stored
    /// version, otherwise `Conflict`. Returns the listing with its new version.
    async fn update(&self, listing: L) -> CoreResult<L>;

    async fn delete(&self, id: i64) -> CoreResult<bool>;
}

/// Aggregate-level access to trips and their owned collections.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn get_with_children(&self, id: i64, include: TripInclude) -> CoreResult<Option<Trip>>;

    /// Persists the trip and makes the stored children of every included
    /// collection match the in-memory ones: new children are inserted,
    /// missing ones are deleted. Collections not included are left alone.
    async fn save_aggregate(&self, trip: Trip, include: TripInclude) -> CoreResult<Trip>;

    /// Deletes the trip together with every owned child.
    async fn delete_with_children(&self, id: i64) -> CoreResult<bool>;
}

#[async_trait]
pub trait WishlistRepository: Send + Sync {
    async fn find(
        &self,
        user_id: &str,
        item_id: i64,
        item_type: ListingKind,
    ) -> CoreResult<Option<WishlistItem>>;

    /// Active (not soft-deleted) entries of a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<WishlistItem>>;

    /// Inserts when `item.id == 0`, updates otherwise.
    async fn save(&self, item: WishlistItem) -> CoreResult<WishlistItem>;

    async fn remove(&self, id: i64) -> CoreResult<()>;

    /// Flags every entry pointing at a listing as deleted. Returns the count.
    async fn soft_delete_for_item(&self, item_id: i64, item_type: ListingKind) -> CoreResult<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, user: User) -> CoreResult<User>;
    async fn get(&self, id: Uuid) -> CoreResult<Option<User>>;
    async fn list(&self) -> CoreResult<Vec<User>>;
    async fn update(&self, user: User) -> CoreResult<User>;
    async fn delete(&self, id: Uuid) -> CoreResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    InFlight,
    Published,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::InFlight => "IN_FLIGHT",
            OutboxStatus::Published => "PUBLISHED",
            OutboxStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OutboxStatus::Pending),
            "IN_FLIGHT" => Some(OutboxStatus::InFlight),
            "PUBLISHED" => Some(OutboxStatus::Published),
            "FAILED" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    pub id: i64,
    pub event: VectorSyncEvent,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
}

/// Durable queue of vector-index notifications, written after the primary
/// commit and drained by [`crate::OutboxRelay`].
#[async_trait]
pub trait EventOutbox: Send + Sync {
    async fn enqueue(&self, event: VectorSyncEvent) -> CoreResult<i64>;

    /// Moves up to `limit` pending records (or in-flight ones whose lease
    /// expired) to in-flight and returns them in insertion order.
    async fn claim_pending(&self, limit: usize, lease: Duration) -> CoreResult<Vec<OutboxRecord>>;

    async fn mark_published(&self, id: i64) -> CoreResult<()>;

    /// Records a failed attempt. With `give_up` the record is parked as
    /// failed, otherwise it goes back to pending.
    async fn mark_failed(&self, id: i64, error: &str, give_up: bool) -> CoreResult<()>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &VectorSyncEvent) -> CoreResult<()>;
}
