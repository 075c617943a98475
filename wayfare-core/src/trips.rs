use std::sync::Arc;
use tracing::{info, warn};
use wayfare_catalog::{Listing, ListingKind, Trip, TripDraft, UserReview};

use crate::events::{deleted_event, saved_event};
use crate::listings::{not_found, notify};
use crate::repository::{EventOutbox, TripInclude, TripRepository, WishlistRepository};
use crate::{ensure_version, CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct UpdateTripCommand {
    pub id: i64,
    pub data: TripDraft,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AddReviewCommand {
    pub trip_id: i64,
    pub user_id: String,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReplaceMode {
    Update(TripDraft),
    Delete,
}

/// Load-modify-save sequences over the trip aggregate.
///
/// Owned collections are cleared in memory and the aggregate is saved before
/// anything else happens, so the store sees the children go away through the
/// parent rather than relying on the parent delete alone.
pub struct TripCoordinator {
    trips: Arc<dyn TripRepository>,
    wishlist: Arc<dyn WishlistRepository>,
    outbox: Arc<dyn EventOutbox>,
}

impl TripCoordinator {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        wishlist: Arc<dyn WishlistRepository>,
        outbox: Arc<dyn EventOutbox>,
    ) -> Self {
        Self { trips, wishlist, outbox }
    }

    /// Trip with reviews, itinerary and activities.
    pub async fn get(&self, id: i64) -> CoreResult<Trip> {
        self.load(id, TripInclude::all()).await
    }

    pub async fn replace_or_delete(&self, id: i64, mode: ReplaceMode) -> CoreResult<i64> {
        match mode {
            ReplaceMode::Update(data) => {
                let trip = self
                    .update(UpdateTripCommand {
                        id,
                        data,
                        expected_version: None,
                    })
                    .await?;
                Ok(trip.id)
            }
            ReplaceMode::Delete => self.delete(id).await,
        }
    }

    /// Full replacement. The itinerary is replaced wholesale (an empty one
    /// in the request clears it); reviews are kept.
    pub async fn update(&self, cmd: UpdateTripCommand) -> CoreResult<Trip> {
        let mut trip = self.load(cmd.id, TripInclude::all()).await?;
        ensure_version("Trip", cmd.id, trip.version, cmd.expected_version)?;

        trip.itinerary.clear();
        cmd.data.map_onto(&mut trip);
        trip.validate()?;
        trip.touch();

        let saved = self.trips.save_aggregate(trip, TripInclude::all()).await?;
        info!(
            "Updated Trip {} ({} itinerary days, {} reviews kept)",
            saved.id,
            saved.itinerary.len(),
            saved.user_reviews.len()
        );

        notify(self.outbox.as_ref(), saved_event(&saved)).await;
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> CoreResult<i64> {
        let mut trip = self.load(id, TripInclude::all()).await?;

        // commit the empty collections first so the children are orphaned
        trip.clear_children();
        trip.touch();
        self.trips.save_aggregate(trip, TripInclude::all()).await?;

        if !self.trips.delete_with_children(id).await? {
            // the emptied trip was committed above, so the row vanished in between
            warn!("Trip {} was deleted concurrently after its children were cleared", id);
            return Err(CoreError::Conflict(format!("Trip {} was deleted concurrently", id)));
        }

        let flagged = self.wishlist.soft_delete_for_item(id, ListingKind::Trip).await?;
        info!("Deleted Trip {} ({} wishlist entries flagged)", id, flagged);

        notify(self.outbox.as_ref(), deleted_event(ListingKind::Trip, id)).await;
        Ok(id)
    }

    pub async fn add_review(&self, cmd: AddReviewCommand) -> CoreResult<UserReview> {
        let review = UserReview::new(cmd.user_id, cmd.rating, cmd.comment)?;

        let mut trip = self.load(cmd.trip_id, TripInclude::reviews()).await?;
        trip.user_reviews.push(review);

        let saved = self.trips.save_aggregate(trip, TripInclude::reviews()).await?;
        info!("Review added to Trip {}", saved.id);

        saved
            .user_reviews
            .into_iter()
            .last()
            .ok_or_else(|| CoreError::InternalError("review was not persisted".to_string()))
    }

    async fn load(&self, id: i64, include: TripInclude) -> CoreResult<Trip> {
        self.trips
            .get_with_children(id, include)
            .await?
            .ok_or_else(|| not_found::<Trip>(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        InMemoryOutbox, InMemoryTripRepository, InMemoryWishlistRepository, TripJournalEntry, TripOp,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use wayfare_catalog::{Activity, ItineraryDay, WishlistItem};
    use wayfare_shared::VectorSyncEvent;

    struct Fixture {
        coordinator: TripCoordinator,
        trips: Arc<InMemoryTripRepository>,
        wishlist: Arc<InMemoryWishlistRepository>,
        outbox: Arc<InMemoryOutbox>,
    }

    fn fixture() -> Fixture {
        let trips = Arc::new(InMemoryTripRepository::new());
        let wishlist = Arc::new(InMemoryWishlistRepository::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let coordinator = TripCoordinator::new(trips.clone(), wishlist.clone(), outbox.clone());
        Fixture {
            coordinator,
            trips,
            wishlist,
            outbox,
        }
    }

    fn review(id: i64, user: &str) -> UserReview {
        UserReview {
            id,
            user_id: user.to_string(),
            rating: 5,
            comment: Some("Loved it".to_string()),
            created_at: Utc::now(),
        }
    }

    /// Trip#3 owning two reviews and one itinerary day.
    async fn seed_trip(trips: &InMemoryTripRepository) -> Trip {
        let draft: TripDraft = serde_json::from_value(serde_json::json!({
            "title": "Alentejo Slow Travel",
            "description": "Cork forests and whitewashed villages",
            "city": "Evora",
            "price_cents": 54000,
            "duration_days": 2
        }))
        .unwrap();
        let mut trip = Trip::from_draft(draft);
        trip.id = 3;
        trip.version = 1;
        trip.user_reviews = vec![review(10, "u1"), review(11, "u2")];
        trip.itinerary = vec![ItineraryDay {
            id: 20,
            day_number: 1,
            title: "Evora old town".to_string(),
            description: None,
            activities: vec![Activity {
                id: 30,
                time: Some("10:00".to_string()),
                title: "Chapel of Bones".to_string(),
                description: None,
            }],
        }];
        trips.seed(trip.clone()).await;
        trip
    }

    fn replacement(itinerary: serde_json::Value) -> TripDraft {
        serde_json::from_value(serde_json::json!({
            "title": "Alentejo Revisited",
            "description": "Now with wine tasting",
            "city": "Evora",
            "price_cents": 61000,
            "duration_days": 2,
            "itinerary": itinerary
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_delete_trip_clears_children_before_delete() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let id = f.coordinator.delete(3).await.unwrap();
        assert_eq!(id, 3);

        assert_eq!(
            f.trips.journal().await,
            vec![
                TripJournalEntry { op: TripOp::Saved, trip_id: 3, reviews: 0, itinerary_days: 0 },
                TripJournalEntry { op: TripOp::Deleted, trip_id: 3, reviews: 0, itinerary_days: 0 },
            ]
        );
        assert!(f.trips.get_with_children(3, TripInclude::all()).await.unwrap().is_none());

        let events = f.outbox.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            VectorSyncEvent::EntityDeleted(e) => {
                assert_eq!(e.entity_id, 3);
                assert_eq!(e.entity_type, "Trip");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_missing_trip_commits_nothing() {
        let f = fixture();
        let result = f.coordinator.delete(99).await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert!(f.trips.journal().await.is_empty());
        assert!(f.outbox.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_flags_wishlist_entries() {
        let f = fixture();
        seed_trip(&f.trips).await;
        f.wishlist
            .save(WishlistItem::new("u1".to_string(), 3, ListingKind::Trip))
            .await
            .unwrap();

        f.coordinator.delete(3).await.unwrap();

        let entry = f.wishlist.find("u1", 3, ListingKind::Trip).await.unwrap().unwrap();
        assert!(entry.is_deleted);
    }

    #[tokio::test]
    async fn test_update_with_empty_itinerary_clears_it_and_keeps_reviews() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let updated = f
            .coordinator
            .update(UpdateTripCommand {
                id: 3,
                data: replacement(serde_json::json!([])),
                expected_version: None,
            })
            .await
            .unwrap();

        assert!(updated.itinerary.is_empty());
        assert_eq!(updated.user_reviews.len(), 2);
        assert_eq!(updated.title, "Alentejo Revisited");

        let stored = f.coordinator.get(3).await.unwrap();
        assert!(stored.itinerary.is_empty());
        assert_eq!(
            stored.user_reviews.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![10, 11]
        );

        let events = f.outbox.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            VectorSyncEvent::EntitySaved(e) => {
                assert_eq!(e.entity_id, 3);
                assert_eq!(e.entity_type, "Trip");
                assert_eq!(e.text, "Alentejo Revisited Now with wine tasting Evora");
                assert_eq!(e.name, "Alentejo Revisited");
                assert_eq!(e.price_cents, 61000);
                assert_eq!(e.city, "Evora");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_replaces_itinerary() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let updated = f
            .coordinator
            .update(UpdateTripCommand {
                id: 3,
                data: replacement(serde_json::json!([
                    {"day_number": 1, "title": "Monsaraz", "activities": [{"title": "Castle walk"}]},
                    {"day_number": 2, "title": "Alqueva lake"}
                ])),
                expected_version: Some(1),
            })
            .await
            .unwrap();

        assert_eq!(updated.itinerary.len(), 2);
        assert!(updated.itinerary.iter().all(|d| d.id != 20));
        assert!(updated.itinerary.iter().all(|d| d.id > 0));
        assert_eq!(updated.itinerary[0].activities[0].title, "Castle walk");
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_update_missing_trip() {
        let f = fixture();
        let result = f
            .coordinator
            .update(UpdateTripCommand {
                id: 42,
                data: replacement(serde_json::json!([])),
                expected_version: None,
            })
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert!(f.outbox.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_stale_version() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let result = f
            .coordinator
            .update(UpdateTripCommand {
                id: 3,
                data: replacement(serde_json::json!([])),
                expected_version: Some(7),
            })
            .await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(f.coordinator.get(3).await.unwrap().itinerary.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_or_delete_dispatch() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let id = f
            .coordinator
            .replace_or_delete(3, ReplaceMode::Update(replacement(serde_json::json!([]))))
            .await
            .unwrap();
        assert_eq!(id, 3);

        let id = f.coordinator.replace_or_delete(3, ReplaceMode::Delete).await.unwrap();
        assert_eq!(id, 3);
        assert!(matches!(f.coordinator.get(3).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_review_keeps_itinerary() {
        let f = fixture();
        seed_trip(&f.trips).await;

        let review = f
            .coordinator
            .add_review(AddReviewCommand {
                trip_id: 3,
                user_id: "u3".to_string(),
                rating: 4,
                comment: None,
            })
            .await
            .unwrap();
        assert!(review.id > 0);
        assert_eq!(review.user_id, "u3");

        let trip = f.coordinator.get(3).await.unwrap();
        assert_eq!(trip.user_reviews.len(), 3);
        assert_eq!(trip.itinerary.len(), 1);

        let invalid = f
            .coordinator
            .add_review(AddReviewCommand {
                trip_id: 3,
                user_id: "u3".to_string(),
                rating: 9,
                comment: None,
            })
            .await;
        assert!(matches!(invalid, Err(CoreError::ValidationError(_))));
    }

    /// Loses every delete race: the row is gone by the time the delete runs.
    struct RacedTrips(Arc<InMemoryTripRepository>);

    #[async_trait]
    impl TripRepository for RacedTrips {
        async fn get_with_children(&self, id: i64, include: TripInclude) -> CoreResult<Option<Trip>> {
            self.0.get_with_children(id, include).await
        }

        async fn save_aggregate(&self, trip: Trip, include: TripInclude) -> CoreResult<Trip> {
            self.0.save_aggregate(trip, include).await
        }

        async fn delete_with_children(&self, _id: i64) -> CoreResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_delete_lost_to_concurrent_delete_is_conflict() {
        let f = fixture();
        seed_trip(&f.trips).await;
        let coordinator = TripCoordinator::new(
            Arc::new(RacedTrips(f.trips.clone())),
            f.wishlist.clone(),
            f.outbox.clone(),
        );

        let result = coordinator.delete(3).await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));

        // the intermediate save committed, nothing was announced
        assert_eq!(f.trips.journal().await.len(), 1);
        assert!(f.outbox.events().await.is_empty());
    }
}
