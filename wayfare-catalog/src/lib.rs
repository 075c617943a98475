pub mod listing;
pub mod car;
pub mod hotel;
pub mod attraction;
pub mod trip;
pub mod wishlist;

pub use listing::{merge_featured, CatalogError, Listing, ListingKind};
pub use car::{Car, CarDraft, CarPatch};
pub use hotel::{Hotel, HotelDraft, HotelPatch};
pub use attraction::{Attraction, AttractionDraft, AttractionPatch};
pub use trip::{
    Activity, ActivityDraft, ItineraryDay, ItineraryDayDraft, Trip, TripDraft, TripPatch, UserReview,
};
pub use wishlist::WishlistItem;
