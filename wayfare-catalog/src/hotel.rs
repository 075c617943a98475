use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_shared::Patch;

use crate::listing::{
    merge_featured, require_non_empty, require_non_negative, CatalogError, Listing, ListingKind,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub address: String,
    pub description: Option<String>,
    pub stars: i16,
    pub price_per_night_cents: i64,
    pub amenities: Vec<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    pub featured: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotelDraft {
    pub name: String,
    pub city: String,
    pub address: String,
    pub description: Option<String>,
    pub stars: i16,
    pub price_per_night_cents: i64,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    #[serde(default, alias = "is_featured")]
    pub featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotelPatch {
    pub name: Patch<String>,
    pub city: Patch<String>,
    pub address: Patch<String>,
    pub description: Patch<Option<String>>,
    pub stars: Patch<i16>,
    pub price_per_night_cents: Patch<i64>,
    pub amenities: Patch<Vec<String>>,
    pub image_url: Patch<Option<String>>,
    pub status: Patch<Option<String>>,
    pub featured: Patch<bool>,
    pub is_featured: Patch<bool>,
}

impl Listing for Hotel {
    type Draft = HotelDraft;
    type Patch = HotelPatch;

    const KIND: ListingKind = ListingKind::Hotel;

    fn from_draft(draft: HotelDraft) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: draft.name,
            city: draft.city,
            address: draft.address,
            description: draft.description,
            stars: draft.stars,
            price_per_night_cents: draft.price_per_night_cents,
            amenities: draft.amenities,
            image_url: draft.image_url,
            status: draft.status,
            featured: draft.featured,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &HotelPatch) {
        patch.name.apply_to(&mut self.name);
        patch.city.apply_to(&mut self.city);
        patch.address.apply_to(&mut self.address);
        patch.description.apply_to(&mut self.description);
        patch.stars.apply_to(&mut self.stars);
        patch.price_per_night_cents.apply_to(&mut self.price_per_night_cents);
        // replaces the whole list, amenities are not merged item by item
        patch.amenities.apply_to(&mut self.amenities);
        patch.image_url.apply_to(&mut self.image_url);
        patch.status.apply_to(&mut self.status);
        merge_featured(&mut self.featured, &patch.featured, &patch.is_featured);
    }

    fn validate(&self) -> Result<(), CatalogError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("city", &self.city)?;
        require_non_negative("price_per_night_cents", self.price_per_night_cents)?;
        if !(1..=5).contains(&self.stars) {
            return Err(CatalogError::invalid("stars", format!("expected 1-5, got {}", self.stars)));
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
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn price_cents(&self) -> i64 {
        self.price_per_night_cents
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

    fn sample_hotel() -> Hotel {
        let draft: HotelDraft = serde_json::from_value(serde_json::json!({
            "name": "Casa Azul",
            "city": "Porto",
            "address": "Rua das Flores 12",
            "stars": 4,
            "price_per_night_cents": 12000,
            "amenities": ["wifi", "breakfast"],
            "is_featured": true
        }))
        .unwrap();
        Hotel::from_draft(draft)
    }

    #[test]
    fn test_draft_accepts_is_featured_alias() {
        let hotel = sample_hotel();
        assert!(hotel.featured);
        assert_eq!(hotel.status, None);
    }

    #[test]
    fn test_patch_replaces_amenities_and_status() {
        let mut hotel = sample_hotel();
        let patch: HotelPatch = serde_json::from_value(serde_json::json!({
            "amenities": ["pool"],
            "status": "Closed",
            "is_featured": false
        }))
        .unwrap();

        hotel.apply_patch(&patch);

        assert_eq!(hotel.amenities, vec!["pool".to_string()]);
        assert_eq!(hotel.status.as_deref(), Some("Closed"));
        assert!(!hotel.is_featured());
        assert_eq!(hotel.stars, 4);
    }

    #[test]
    fn test_stars_out_of_range() {
        let mut hotel = sample_hotel();
        hotel.apply_patch(&HotelPatch {
            stars: Patch::Set(6),
            ..Default::default()
        });
        assert!(hotel.validate().is_err());
    }

    #[test]
    fn test_every_patchable_field_is_applied() {
        use crate::listing::merge_checks::assert_each_field_overwrites;
        use serde_json::json;

        let mut base = sample_hotel();
        base.featured = false;
        assert_each_field_overwrites(
            &base,
            &[
                ("name", "name", json!("Casa Verde")),
                ("city", "city", json!("Braga")),
                ("address", "address", json!("Avenida Central 3")),
                ("description", "description", json!("Quiet courtyard rooms")),
                ("stars", "stars", json!(5)),
                ("price_per_night_cents", "price_per_night_cents", json!(15000)),
                ("amenities", "amenities", json!(["spa"])),
                ("image_url", "image_url", json!("https://img.example/verde.jpg")),
                ("status", "status", json!("Open")),
                ("featured", "featured", json!(true)),
                ("is_featured", "featured", json!(true)),
            ],
        );
    }

    #[test]
    fn test_empty_patch_is_noop() {
        crate::listing::merge_checks::assert_empty_patch_is_noop(&sample_hotel());
    }

    #[test]
    fn test_absent_fields_are_preserved() {
        let original = sample_hotel();
        let patched = crate::listing::merge_checks::apply(
            &original,
            serde_json::json!({"price_per_night_cents": 9900}),
        );

        assert_eq!(patched.price_per_night_cents, 9900);
        assert_eq!(patched.name, original.name);
        assert_eq!(patched.amenities, original.amenities);
        assert_eq!(patched.featured, original.featured);
    }

    #[test]
    fn test_patch_is_idempotent() {
        crate::listing::merge_checks::assert_idempotent(
            &sample_hotel(),
            serde_json::json!({"stars": 5, "amenities": ["pool"], "status": null, "featured": false}),
        );
    }
}
