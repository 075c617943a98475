//! In-memory collaborators for tests and local runs without Postgres.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;
use wayfare_catalog::{Listing, ListingKind, Trip, WishlistItem};
use wayfare_shared::VectorSyncEvent;

use crate::repository::{
    EventOutbox, EventPublisher, ListingQuery, ListingRepository, OutboxRecord, OutboxStatus,
    TripInclude, TripRepository, UserRepository, WishlistRepository,
};
use crate::users::User;
use crate::{CoreError, CoreResult};

fn stale(kind: &str, id: i64, stored: i64, given: i64) -> CoreError {
    CoreError::Conflict(format!(
        "{} {} was modified concurrently (stored version {}, saving version {})",
        kind, id, stored, given
    ))
}

// ============================================================================
// Listings
// ============================================================================

pub struct InMemoryListingRepository<L> {
    rows: RwLock<BTreeMap<i64, L>>,
    next_id: AtomicI64,
}

impl<L: Listing> InMemoryListingRepository<L> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl<L: Listing> Default for InMemoryListingRepository<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<L: Listing> ListingRepository<L> for InMemoryListingRepository<L> {
    async fn insert(&self, mut listing: L) -> CoreResult<L> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        listing.set_id(id);
        listing.set_version(1);
        self.rows.write().await.insert(id, listing.clone());
        Ok(listing)
    }

    async fn get(&self, id: i64) -> CoreResult<Option<L>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<L>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|l| query.matches(*l))
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, mut listing: L) -> CoreResult<L> {
        let mut rows = self.rows.write().await;
        let stored = rows
            .get(&listing.id())
            .ok_or_else(|| CoreError::NotFound(format!("{} {}", L::KIND, listing.id())))?;
        if stored.version() != listing.version() {
            return Err(stale(L::KIND.as_str(), listing.id(), stored.version(), listing.version()));
        }

        listing.set_version(listing.version() + 1);
        rows.insert(listing.id(), listing.clone());
        Ok(listing)
    }

    async fn delete(&self, id: i64) -> CoreResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

// ============================================================================
// Trips
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripOp {
    Saved,
    Deleted,
}

/// One committed aggregate write, with the child counts the store held
/// right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripJournalEntry {
    pub op: TripOp,
    pub trip_id: i64,
    pub reviews: usize,
    pub itinerary_days: usize,
}

pub struct InMemoryTripRepository {
    trips: RwLock<BTreeMap<i64, Trip>>,
    journal: RwLock<Vec<TripJournalEntry>>,
    next_id: AtomicI64,
    next_child_id: AtomicI64,
}

impl Default for InMemoryTripRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self {
            trips: RwLock::new(BTreeMap::new()),
            journal: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            next_child_id: AtomicI64::new(1),
        }
    }

    /// Stores a trip exactly as given, ids and children included.
    pub async fn seed(&self, trip: Trip) {
        self.next_id.fetch_max(trip.id + 1, Ordering::SeqCst);
        let max_child = trip
            .user_reviews
            .iter()
            .map(|r| r.id)
            .chain(trip.itinerary.iter().map(|d| d.id))
            .chain(trip.itinerary.iter().flat_map(|d| d.activities.iter().map(|a| a.id)))
            .max()
            .unwrap_or(0);
        self.next_child_id.fetch_max(max_child + 1, Ordering::SeqCst);
        self.trips.write().await.insert(trip.id, trip);
    }

    pub async fn journal(&self) -> Vec<TripJournalEntry> {
        self.journal.read().await.clone()
    }

    fn assign_child_ids(&self, trip: &mut Trip, include: TripInclude) {
        let next = || self.next_child_id.fetch_add(1, Ordering::SeqCst);
        if include.reviews {
            for review in trip.user_reviews.iter_mut().filter(|r| r.id == 0) {
                review.id = next();
            }
        }
        if include.itinerary {
            for day in trip.itinerary.iter_mut() {
                if day.id == 0 {
                    day.id = next();
                }
                for activity in day.activities.iter_mut().filter(|a| a.id == 0) {
                    activity.id = next();
                }
            }
        }
    }

    async fn record(&self, op: TripOp, trip: &Trip) {
        self.journal.write().await.push(TripJournalEntry {
            op,
            trip_id: trip.id,
            reviews: trip.user_reviews.len(),
            itinerary_days: trip.itinerary.len(),
        });
    }
}

fn project(trip: &Trip, include: TripInclude) -> Trip {
    let mut trip = trip.clone();
    if !include.reviews {
        trip.user_reviews.clear();
    }
    if !include.itinerary {
        trip.itinerary.clear();
    }
    trip
}

fn scalars_only(trip: &Trip) -> Trip {
    project(trip, TripInclude { reviews: false, itinerary: false })
}

#[async_trait]
impl ListingRepository<Trip> for InMemoryTripRepository {
    async fn insert(&self, mut trip: Trip) -> CoreResult<Trip> {
        trip.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        trip.version = 1;
        self.assign_child_ids(&mut trip, TripInclude::all());
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn get(&self, id: i64) -> CoreResult<Option<Trip>> {
        Ok(self.trips.read().await.get(&id).map(scalars_only))
    }

    async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<Trip>> {
        let trips = self.trips.read().await;
        Ok(trips
            .values()
            .filter(|t| query.matches(*t))
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .map(scalars_only)
            .collect())
    }

    async fn update(&self, mut trip: Trip) -> CoreResult<Trip> {
        let mut trips = self.trips.write().await;
        let stored = trips
            .get(&trip.id)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", trip.id)))?;
        if stored.version != trip.version {
            return Err(stale("Trip", trip.id, stored.version, trip.version));
        }

        trip.version += 1;
        trip.user_reviews = stored.user_reviews.clone();
        trip.itinerary = stored.itinerary.clone();
        let result = scalars_only(&trip);
        trips.insert(trip.id, trip);
        Ok(result)
    }

    async fn delete(&self, id: i64) -> CoreResult<bool> {
        self.delete_with_children(id).await
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn get_with_children(&self, id: i64, include: TripInclude) -> CoreResult<Option<Trip>> {
        Ok(self.trips.read().await.get(&id).map(|t| project(t, include)))
    }

    async fn save_aggregate(&self, mut trip: Trip, include: TripInclude) -> CoreResult<Trip> {
        let saved = {
            let mut trips = self.trips.write().await;
            let stored = trips
                .get(&trip.id)
                .ok_or_else(|| CoreError::NotFound(format!("Trip {}", trip.id)))?;
            if stored.version != trip.version {
                return Err(stale("Trip", trip.id, stored.version, trip.version));
            }

            self.assign_child_ids(&mut trip, include);
            if !include.reviews {
                trip.user_reviews = stored.user_reviews.clone();
            }
            if !include.itinerary {
                trip.itinerary = stored.itinerary.clone();
            }
            trip.version += 1;
            trips.insert(trip.id, trip.clone());
            trip
        };

        self.record(TripOp::Saved, &saved).await;
        Ok(project(&saved, include))
    }

    async fn delete_with_children(&self, id: i64) -> CoreResult<bool> {
        let removed = self.trips.write().await.remove(&id);
        match removed {
            Some(trip) => {
                self.record(TripOp::Deleted, &trip).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Wishlist
// ============================================================================

pub struct InMemoryWishlistRepository {
    items: RwLock<Vec<WishlistItem>>,
    next_id: AtomicI64,
}

impl Default for InMemoryWishlistRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWishlistRepository {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl WishlistRepository for InMemoryWishlistRepository {
    async fn find(
        &self,
        user_id: &str,
        item_id: i64,
        item_type: ListingKind,
    ) -> CoreResult<Option<WishlistItem>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .find(|i| i.matches(user_id, item_id, item_type))
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<WishlistItem>> {
        let mut items: Vec<WishlistItem> = self
            .items
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id && !i.is_deleted)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn save(&self, mut item: WishlistItem) -> CoreResult<WishlistItem> {
        let mut items = self.items.write().await;
        if item.id == 0 {
            item.id = self.next_id.fetch_add(1, Ordering::SeqCst);
            items.push(item.clone());
            return Ok(item);
        }

        let slot = items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| CoreError::NotFound(format!("Wishlist item {}", item.id)))?;
        *slot = item.clone();
        Ok(item)
    }

    async fn remove(&self, id: i64) -> CoreResult<()> {
        self.items.write().await.retain(|i| i.id != id);
        Ok(())
    }

    async fn soft_delete_for_item(&self, item_id: i64, item_type: ListingKind) -> CoreResult<u64> {
        let mut flagged = 0;
        for item in self.items.write().await.iter_mut() {
            if item.item_id == item_id && item.item_type == item_type && !item.is_deleted {
                item.is_deleted = true;
                flagged += 1;
            }
        }
        Ok(flagged)
    }
}

// ============================================================================
// Users
// ============================================================================

pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> CoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(CoreError::Conflict("Email already registered".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list(&self) -> CoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn update(&self, user: User) -> CoreResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(CoreError::NotFound(format!("User {}", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

// ============================================================================
// Outbox & publisher
// ============================================================================

struct OutboxEntry {
    id: i64,
    payload: serde_json::Value,
    status: OutboxStatus,
    attempts: i32,
    last_error: Option<String>,
    claimed_at: Option<Instant>,
}

impl OutboxEntry {
    fn decode(&self) -> CoreResult<OutboxRecord> {
        let event: VectorSyncEvent = serde_json::from_value(self.payload.clone())
            .map_err(|e| CoreError::InternalError(format!("Corrupt outbox record {}: {}", self.id, e)))?;
        Ok(OutboxRecord {
            id: self.id,
            event,
            status: self.status,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
        })
    }
}

/// Outbox kept as raw JSON payloads, decoded on claim like the table rows.
pub struct InMemoryOutbox {
    entries: RwLock<Vec<OutboxEntry>>,
    next_id: AtomicI64,
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Queues an arbitrary payload, e.g. one written by an older producer.
    pub async fn enqueue_raw(&self, payload: serde_json::Value) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.push(OutboxEntry {
            id,
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            claimed_at: None,
        });
        id
    }

    /// Every decodable event ever queued, in order, regardless of delivery state.
    pub async fn events(&self) -> Vec<VectorSyncEvent> {
        self.records().await.into_iter().map(|r| r.event).collect()
    }

    pub async fn records(&self) -> Vec<OutboxRecord> {
        self.entries.read().await.iter().filter_map(|e| e.decode().ok()).collect()
    }

    /// Status and attempt count of any record, decodable or not.
    pub async fn state(&self, id: i64) -> Option<(OutboxStatus, i32)> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.status, e.attempts))
    }
}

#[async_trait]
impl EventOutbox for InMemoryOutbox {
    async fn enqueue(&self, event: VectorSyncEvent) -> CoreResult<i64> {
        let payload = serde_json::to_value(&event)
            .map_err(|e| CoreError::InternalError(format!("Failed to encode event: {}", e)))?;
        Ok(self.enqueue_raw(payload).await)
    }

    async fn claim_pending(&self, limit: usize, lease: Duration) -> CoreResult<Vec<OutboxRecord>> {
        let now = Instant::now();
        let mut claimed = Vec::new();
        let mut taken = 0;
        for entry in self.entries.write().await.iter_mut() {
            if taken >= limit {
                break;
            }
            let lease_expired = entry
                .claimed_at
                .map(|at| now.duration_since(at) >= lease)
                .unwrap_or(true);
            let claimable = match entry.status {
                OutboxStatus::Pending => true,
                OutboxStatus::InFlight => lease_expired,
                OutboxStatus::Published | OutboxStatus::Failed => false,
            };
            if !claimable {
                continue;
            }
            taken += 1;
            entry.status = OutboxStatus::InFlight;
            entry.claimed_at = Some(now);
            match entry.decode() {
                Ok(record) => claimed.push(record),
                Err(e) => {
                    warn!("Parking outbox record {}: {}", entry.id, e);
                    entry.status = OutboxStatus::Failed;
                    entry.attempts += 1;
                    entry.last_error = Some(e.to_string());
                    entry.claimed_at = None;
                }
            }
        }
        Ok(claimed)
    }

    async fn mark_published(&self, id: i64) -> CoreResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("Outbox record {}", id)))?;
        entry.status = OutboxStatus::Published;
        entry.claimed_at = None;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str, give_up: bool) -> CoreResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("Outbox record {}", id)))?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        entry.status = if give_up {
            OutboxStatus::Failed
        } else {
            OutboxStatus::Pending
        };
        entry.claimed_at = None;
        Ok(())
    }
}

/// Publisher that keeps what it was given, or refuses everything.
pub struct RecordingPublisher {
    published: RwLock<Vec<VectorSyncEvent>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn published(&self) -> Vec<VectorSyncEvent> {
        self.published.read().await.clone()
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &VectorSyncEvent) -> CoreResult<()> {
        if self.fail {
            return Err(CoreError::InternalError("broker unavailable".to_string()));
        }
        self.published.write().await.push(event.clone());
        Ok(())
    }
}
