use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_shared::Patch;

use crate::listing::{require_non_empty, require_non_negative, CatalogError, Listing, ListingKind};

/// A bookable attraction (museum, tour, park...).
///
/// Unlike the other listings, attractions carry a single `is_featured` flag
/// and an `availability` field in place of a generic status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attraction {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub description: Option<String>,
    pub category: String,
    pub ticket_price_cents: i64,
    pub opening_hours: Option<String>,
    pub image_url: Option<String>,
    pub availability: Option<String>,
    pub is_featured: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttractionDraft {
    pub name: String,
    pub city: String,
    pub description: Option<String>,
    pub category: String,
    pub ticket_price_cents: i64,
    pub opening_hours: Option<String>,
    pub image_url: Option<String>,
    pub availability: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttractionPatch {
    pub name: Patch<String>,
    pub city: Patch<String>,
    pub description: Patch<Option<String>>,
    pub category: Patch<String>,
    pub ticket_price_cents: Patch<i64>,
    pub opening_hours: Patch<Option<String>>,
    pub image_url: Patch<Option<String>>,
    pub availability: Patch<Option<String>>,
    pub is_featured: Patch<bool>,
}

impl Listing for Attraction {
    type Draft = AttractionDraft;
    type Patch = AttractionPatch;

    const KIND: ListingKind = ListingKind::Attraction;
    const PAIRED_FEATURED_FLAG: bool = false;

    fn from_draft(draft: AttractionDraft) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: draft.name,
            city: draft.city,
            description: draft.description,
            category: draft.category,
            ticket_price_cents: draft.ticket_price_cents,
            opening_hours: draft.opening_hours,
            image_url: draft.image_url,
            availability: draft.availability,
            is_featured: draft.is_featured,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &AttractionPatch) {
        patch.name.apply_to(&mut self.name);
        patch.city.apply_to(&mut self.city);
        patch.description.apply_to(&mut self.description);
        patch.category.apply_to(&mut self.category);
        patch.ticket_price_cents.apply_to(&mut self.ticket_price_cents);
        patch.opening_hours.apply_to(&mut self.opening_hours);
        patch.image_url.apply_to(&mut self.image_url);
        patch.availability.apply_to(&mut self.availability);
        patch.is_featured.apply_to(&mut self.is_featured);
    }

    fn validate(&self) -> Result<(), CatalogError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("city", &self.city)?;
        require_non_empty("category", &self.category)?;
        require_non_negative("ticket_price_cents", self.ticket_price_cents)
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
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn price_cents(&self) -> i64 {
        self.ticket_price_cents
    }

    fn is_featured(&self) -> bool {
        self.is_featured
    }

    fn status(&self) -> Option<&str> {
        self.availability.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::merge_checks;

    fn sample_attraction() -> Attraction {
        Attraction::from_draft(AttractionDraft {
            name: "Belem Tower".to_string(),
            city: "Lisbon".to_string(),
            description: None,
            category: "Monument".to_string(),
            ticket_price_cents: 800,
            opening_hours: Some("10:00-18:00".to_string()),
            image_url: None,
            availability: Some("Open".to_string()),
            is_featured: false,
        })
    }

    #[test]
    fn test_attraction_has_no_featured_field() {
        let result: Result<AttractionPatch, _> =
            serde_json::from_value(serde_json::json!({"featured": true}));
        assert!(result.is_err());

        let patch: AttractionPatch =
            serde_json::from_value(serde_json::json!({"is_featured": true, "availability": "SoldOut"}))
                .unwrap();
        let mut attraction = sample_attraction();
        attraction.apply_patch(&patch);

        assert!(attraction.is_featured());
        assert_eq!(attraction.status(), Some("SoldOut"));
        assert_eq!(attraction.opening_hours.as_deref(), Some("10:00-18:00"));
    }

    #[test]
    fn test_every_patchable_field_is_applied() {
        use serde_json::json;

        merge_checks::assert_each_field_overwrites(
            &sample_attraction(),
            &[
                ("name", "name", json!("Jeronimos Monastery")),
                ("city", "city", json!("Sintra")),
                ("description", "description", json!("Manueline cloisters")),
                ("category", "category", json!("Museum")),
                ("ticket_price_cents", "ticket_price_cents", json!(1200)),
                ("opening_hours", "opening_hours", json!(null)),
                ("image_url", "image_url", json!("https://img.example/belem.jpg")),
                ("availability", "availability", json!("SoldOut")),
                ("is_featured", "is_featured", json!(true)),
            ],
        );
    }

    #[test]
    fn test_empty_patch_is_noop() {
        merge_checks::assert_empty_patch_is_noop(&sample_attraction());
    }

    #[test]
    fn test_absent_fields_are_preserved() {
        let original = sample_attraction();
        let patched = merge_checks::apply(&original, serde_json::json!({"availability": null}));

        assert_eq!(patched.availability, None);
        assert_eq!(patched.opening_hours, original.opening_hours);
        assert_eq!(patched.ticket_price_cents, original.ticket_price_cents);
        assert_eq!(patched.is_featured, original.is_featured);
    }

    #[test]
    fn test_patch_is_idempotent() {
        merge_checks::assert_idempotent(
            &sample_attraction(),
            serde_json::json!({"ticket_price_cents": 950, "availability": null, "is_featured": true}),
        );
    }
}
