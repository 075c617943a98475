use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wayfare_shared::Patch;

/// Listing kinds offered on the marketplace. The `Display` form doubles as
/// the type tag carried by vector-index events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Car,
    Hotel,
    Attraction,
    Trip,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Car => "Car",
            ListingKind::Hotel => "Hotel",
            ListingKind::Attraction => "Attraction",
            ListingKind::Trip => "Trip",
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "car" | "cars" => Ok(ListingKind::Car),
            "hotel" | "hotels" => Ok(ListingKind::Hotel),
            "attraction" | "attractions" => Ok(ListingKind::Attraction),
            "trip" | "trips" => Ok(ListingKind::Trip),
            _ => Err(CatalogError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Unknown listing kind: {0}")]
    UnknownKind(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl CatalogError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CatalogError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Common behaviour of everything that can be listed, patched, wishlisted
/// and indexed for search.
pub trait Listing:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Full payload used for creation.
    type Draft: DeserializeOwned + Send + Sync + 'static;
    /// Sparse payload used by PATCH.
    type Patch: DeserializeOwned + Send + Sync + 'static;

    const KIND: ListingKind;

    /// Whether responses expose the featured flag under both `featured` and
    /// `is_featured`. Attractions only ever had `is_featured`.
    const PAIRED_FEATURED_FLAG: bool = true;

    /// Builds an unsaved listing (id and version 0) from a draft.
    fn from_draft(draft: Self::Draft) -> Self;

    /// Partial Update Merger: overwrite every field present in `patch`,
    /// leave the rest untouched.
    fn apply_patch(&mut self, patch: &Self::Patch);

    fn validate(&self) -> Result<(), CatalogError>;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);
    fn touch(&mut self);

    fn name(&self) -> &str;
    fn description(&self) -> Option<&str>;
    fn city(&self) -> &str;
    fn price_cents(&self) -> i64;
    fn is_featured(&self) -> bool;
    fn status(&self) -> Option<&str>;

    /// Text indexed for semantic search: name, description and city.
    fn synopsis(&self) -> String {
        [Some(self.name()), self.description(), Some(self.city())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Applies the `featured` / `is_featured` pair onto the single stored flag.
/// `featured` is evaluated first, so `is_featured` wins when both are present.
pub fn merge_featured(flag: &mut bool, featured: &Patch<bool>, is_featured: &Patch<bool>) {
    featured.apply_to(flag);
    is_featured.apply_to(flag);
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::invalid(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &'static str, value: i64) -> Result<(), CatalogError> {
    if value < 0 {
        return Err(CatalogError::invalid(field, format!("must not be negative, got {}", value)));
    }
    Ok(())
}
