use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use wayfare_shared::Patch;

use crate::listing::{
    merge_featured, require_non_empty, require_non_negative, CatalogError, Listing, ListingKind,
};

/// A packaged trip. The aggregate root owns its reviews and its itinerary;
/// neither exists without the trip.
///
/// `user_reviews` and `itinerary` are only populated when the trip is loaded
/// through a relation-inclusive fetch. Plain listing reads leave them empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub city: String,
    pub price_cents: i64,
    pub duration_days: i32,
    pub start_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    pub featured: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub user_reviews: Vec<UserReview>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserReview {
    pub id: i64,
    pub user_id: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryDay {
    pub id: i64,
    pub day_number: i32,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub time: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

/// Full trip payload, used both for creation and for full replacement (PUT).
#[derive(Debug, Clone, Deserialize)]
pub struct TripDraft {
    pub title: String,
    pub description: String,
    pub city: String,
    pub price_cents: i64,
    pub duration_days: i32,
    pub start_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    #[serde(default, alias = "is_featured")]
    pub featured: bool,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDayDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItineraryDayDraft {
    pub day_number: i32,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub activities: Vec<ActivityDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityDraft {
    pub time: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

/// Sparse trip update. Owned collections are not patchable; use a full
/// update to replace the itinerary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TripPatch {
    pub title: Patch<String>,
    pub description: Patch<String>,
    pub city: Patch<String>,
    pub price_cents: Patch<i64>,
    pub duration_days: Patch<i32>,
    pub start_date: Patch<Option<NaiveDate>>,
    pub image_url: Patch<Option<String>>,
    pub status: Patch<Option<String>>,
    pub featured: Patch<bool>,
    pub is_featured: Patch<bool>,
}

impl TripDraft {
    /// Projects the draft onto an existing trip: scalar fields are
    /// overwritten and the itinerary is replaced wholesale. Reviews are left
    /// alone.
    pub fn map_onto(self, trip: &mut Trip) {
        trip.title = self.title;
        trip.description = self.description;
        trip.city = self.city;
        trip.price_cents = self.price_cents;
        trip.duration_days = self.duration_days;
        trip.start_date = self.start_date;
        trip.image_url = self.image_url;
        trip.status = self.status;
        trip.featured = self.featured;
        trip.itinerary = self.itinerary.into_iter().map(ItineraryDay::from).collect();
    }
}

impl From<ItineraryDayDraft> for ItineraryDay {
    fn from(draft: ItineraryDayDraft) -> Self {
        Self {
            id: 0,
            day_number: draft.day_number,
            title: draft.title,
            description: draft.description,
            activities: draft.activities.into_iter().map(Activity::from).collect(),
        }
    }
}

impl From<ActivityDraft> for Activity {
    fn from(draft: ActivityDraft) -> Self {
        Self {
            id: 0,
            time: draft.time,
            title: draft.title,
            description: draft.description,
        }
    }
}

impl UserReview {
    pub fn new(user_id: String, rating: i16, comment: Option<String>) -> Result<Self, CatalogError> {
        if !(1..=5).contains(&rating) {
            return Err(CatalogError::invalid("rating", format!("expected 1-5, got {}", rating)));
        }
        Ok(Self {
            id: 0,
            user_id,
            rating,
            comment,
            created_at: Utc::now(),
        })
    }
}

impl Trip {
    /// Drops every owned child. Persisting the trip afterwards orphans them.
    pub fn clear_children(&mut self) {
        self.user_reviews.clear();
        self.itinerary.clear();
    }

    pub fn average_rating(&self) -> Option<f64> {
        if self.user_reviews.is_empty() {
            return None;
        }
        let total: i64 = self.user_reviews.iter().map(|r| r.rating as i64).sum();
        Some(total as f64 / self.user_reviews.len() as f64)
    }
}

impl Listing for Trip {
    type Draft = TripDraft;
    type Patch = TripPatch;

    const KIND: ListingKind = ListingKind::Trip;

    fn from_draft(draft: TripDraft) -> Self {
        let now = Utc::now();
        let mut trip = Self {
            id: 0,
            title: String::new(),
            description: String::new(),
            city: String::new(),
            price_cents: 0,
            duration_days: 0,
            start_date: None,
            image_url: None,
            status: None,
            featured: false,
            version: 0,
            created_at: now,
            updated_at: now,
            user_reviews: Vec::new(),
            itinerary: Vec::new(),
        };
        draft.map_onto(&mut trip);
        trip
    }

    fn apply_patch(&mut self, patch: &TripPatch) {
        patch.title.apply_to(&mut self.title);
        patch.description.apply_to(&mut self.description);
        patch.city.apply_to(&mut self.city);
        patch.price_cents.apply_to(&mut self.price_cents);
        patch.duration_days.apply_to(&mut self.duration_days);
        patch.start_date.apply_to(&mut self.start_date);
        patch.image_url.apply_to(&mut self.image_url);
        patch.status.apply_to(&mut self.status);
        merge_featured(&mut self.featured, &patch.featured, &patch.is_featured);
    }

    fn validate(&self) -> Result<(), CatalogError> {
        require_non_empty("title", &self.title)?;
        require_non_empty("city", &self.city)?;
        require_non_negative("price_cents", self.price_cents)?;
        if self.duration_days < 1 {
            return Err(CatalogError::invalid("duration_days", "must be at least one day"));
        }

        let mut seen = HashSet::new();
        for day in &self.itinerary {
            if day.day_number < 1 || day.day_number > self.duration_days {
                return Err(CatalogError::invalid(
                    "itinerary",
                    format!("day {} is outside a {}-day trip", day.day_number, self.duration_days),
                ));
            }
            if !seen.insert(day.day_number) {
                return Err(CatalogError::invalid(
                    "itinerary",
                    format!("day {} appears twice", day.day_number),
                ));
            }
        }
        Ok(())
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn description(&self) -> Option<&str> {
        Some(&self.description)
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn price_cents(&self) -> i64 {
        self.price_cents
    }

    fn is_featured(&self) -> bool {
        self.featured
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> TripDraft {
        serde_json::from_value(serde_json::json!({
            "title": "Douro Valley Escape",
            "description": "Wine and river cruises",
            "city": "Porto",
            "price_cents": 89000,
            "duration_days": 3,
            "itinerary": [
                {"day_number": 1, "title": "Arrival", "activities": [{"title": "Check-in"}]},
                {"day_number": 2, "title": "Quintas", "activities": []}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_map_onto_replaces_itinerary_keeps_reviews() {
        let mut trip = Trip::from_draft(draft());
        trip.id = 3;
        trip.user_reviews.push(UserReview::new("u1".to_string(), 5, None).unwrap());
        assert_eq!(trip.itinerary.len(), 2);

        let mut replacement = draft();
        replacement.itinerary.clear();
        replacement.title = "Douro in a Day".to_string();
        replacement.map_onto(&mut trip);

        assert_eq!(trip.id, 3);
        assert_eq!(trip.title, "Douro in a Day");
        assert!(trip.itinerary.is_empty());
        assert_eq!(trip.user_reviews.len(), 1);
    }

    #[test]
    fn test_patch_does_not_touch_children() {
        let mut trip = Trip::from_draft(draft());
        let before = trip.itinerary.clone();

        let patch: TripPatch =
            serde_json::from_value(serde_json::json!({"featured": true, "status": "SoldOut"})).unwrap();
        trip.apply_patch(&patch);

        assert!(trip.is_featured());
        assert_eq!(trip.status.as_deref(), Some("SoldOut"));
        assert_eq!(trip.itinerary, before);
    }

    #[test]
    fn test_itinerary_validation() {
        let mut trip = Trip::from_draft(draft());
        assert!(trip.validate().is_ok());

        trip.itinerary[1].day_number = 1;
        assert!(trip.validate().is_err());

        trip.itinerary[1].day_number = 4;
        assert!(trip.validate().is_err());
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(UserReview::new("u1".to_string(), 0, None).is_err());
        assert!(UserReview::new("u1".to_string(), 6, None).is_err());

        let mut trip = Trip::from_draft(draft());
        assert_eq!(trip.average_rating(), None);
        trip.user_reviews.push(UserReview::new("u1".to_string(), 4, None).unwrap());
        trip.user_reviews.push(UserReview::new("u2".to_string(), 5, None).unwrap());
        assert_eq!(trip.average_rating(), Some(4.5));
    }

    #[test]
    fn test_synopsis_uses_title_description_city() {
        let trip = Trip::from_draft(draft());
        assert_eq!(trip.synopsis(), "Douro Valley Escape Wine and river cruises Porto");
    }

    #[test]
    fn test_every_patchable_field_is_applied() {
        use crate::listing::merge_checks::assert_each_field_overwrites;
        use serde_json::json;

        assert_each_field_overwrites(
            &Trip::from_draft(draft()),
            &[
                ("title", "title", json!("Douro by Train")),
                ("description", "description", json!("Scenic rail and tastings")),
                ("city", "city", json!("Regua")),
                ("price_cents", "price_cents", json!(99000)),
                ("duration_days", "duration_days", json!(4)),
                ("start_date", "start_date", json!("2027-05-01")),
                ("image_url", "image_url", json!("https://img.example/douro.jpg")),
                ("status", "status", json!("Open")),
                ("featured", "featured", json!(true)),
                ("is_featured", "featured", json!(true)),
            ],
        );
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut trip = Trip::from_draft(draft());
        trip.user_reviews.push(UserReview::new("u2".to_string(), 4, None).unwrap());
        crate::listing::merge_checks::assert_empty_patch_is_noop(&trip);
    }

    #[test]
    fn test_absent_fields_are_preserved() {
        let original = Trip::from_draft(draft());
        let patched =
            crate::listing::merge_checks::apply(&original, serde_json::json!({"duration_days": 5}));

        assert_eq!(patched.duration_days, 5);
        assert_eq!(patched.title, original.title);
        assert_eq!(patched.price_cents, original.price_cents);
        assert_eq!(patched.itinerary, original.itinerary);
    }

    #[test]
    fn test_patch_is_idempotent() {
        crate::listing::merge_checks::assert_idempotent(
            &Trip::from_draft(draft()),
            serde_json::json!({"title": "Douro Weekend", "start_date": null, "is_featured": true}),
        );
    }
}
