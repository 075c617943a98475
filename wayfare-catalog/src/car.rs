use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfare_shared::Patch;

use crate::listing::{
    merge_featured, require_non_empty, require_non_negative, CatalogError, Listing, ListingKind,
};

/// A rental car.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Car {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub city: String,
    pub description: Option<String>,
    pub price_per_day_cents: i64,
    pub seats: i32,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    pub featured: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarDraft {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub city: String,
    pub description: Option<String>,
    pub price_per_day_cents: i64,
    pub seats: i32,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    #[serde(default, alias = "is_featured")]
    pub featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarPatch {
    pub name: Patch<String>,
    pub brand: Patch<String>,
    pub model: Patch<String>,
    pub year: Patch<i32>,
    pub city: Patch<String>,
    pub description: Patch<Option<String>>,
    pub price_per_day_cents: Patch<i64>,
    pub seats: Patch<i32>,
    pub transmission: Patch<Option<String>>,
    pub fuel_type: Patch<Option<String>>,
    pub image_url: Patch<Option<String>>,
    pub status: Patch<Option<String>>,
    pub featured: Patch<bool>,
    pub is_featured: Patch<bool>,
}

impl Listing for Car {
    type Draft = CarDraft;
    type Patch = CarPatch;

    const KIND: ListingKind = ListingKind::Car;

    fn from_draft(draft: CarDraft) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: draft.name,
            brand: draft.brand,
            model: draft.model,
            year: draft.year,
            city: draft.city,
            description: draft.description,
            price_per_day_cents: draft.price_per_day_cents,
            seats: draft.seats,
            transmission: draft.transmission,
            fuel_type: draft.fuel_type,
            image_url: draft.image_url,
            status: draft.status,
            featured: draft.featured,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &CarPatch) {
        patch.name.apply_to(&mut self.name);
        patch.brand.apply_to(&mut self.brand);
        patch.model.apply_to(&mut self.model);
        patch.year.apply_to(&mut self.year);
        patch.city.apply_to(&mut self.city);
        patch.description.apply_to(&mut self.description);
        patch.price_per_day_cents.apply_to(&mut self.price_per_day_cents);
        patch.seats.apply_to(&mut self.seats);
        patch.transmission.apply_to(&mut self.transmission);
        patch.fuel_type.apply_to(&mut self.fuel_type);
        patch.image_url.apply_to(&mut self.image_url);
        patch.status.apply_to(&mut self.status);
        merge_featured(&mut self.featured, &patch.featured, &patch.is_featured);
    }

    fn validate(&self) -> Result<(), CatalogError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("city", &self.city)?;
        require_non_negative("price_per_day_cents", self.price_per_day_cents)?;
        if self.seats < 1 {
            return Err(CatalogError::invalid("seats", "a car needs at least one seat"));
        }
        if !(1886..=2100).contains(&self.year) {
            return Err(CatalogError::invalid("year", format!("{} is out of range", self.year)));
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
        self.price_per_day_cents
    }

    fn is_featured(&self) -> bool {
        self.featured
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
