use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::ListingKind;

/// A listing saved by a user. Unique per `(user_id, item_id, item_type)`.
///
/// `is_deleted` is set when the listing itself goes away; the user removing
/// the entry deletes the row outright.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WishlistItem {
    pub id: i64,
    pub user_id: String,
    pub item_id: i64,
    pub item_type: ListingKind,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl WishlistItem {
    pub fn new(user_id: String, item_id: i64, item_type: ListingKind) -> Self {
        Self {
            id: 0,
            user_id,
            item_id,
            item_type,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn matches(&self, user_id: &str, item_id: i64, item_type: ListingKind) -> bool {
        self.user_id == user_id && self.item_id == item_id && self.item_type == item_type
    }
}
