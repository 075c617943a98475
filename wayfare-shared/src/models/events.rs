use serde::{Deserialize, Serialize};

/// Upsert of a listing into the vector index.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntitySavedToVectorDbEvent {
    pub entity_id: i64,
    pub entity_type: String,
    /// Searchable synopsis: title/name, description and city.
    pub text: String,
    pub name: String,
    pub price_cents: i64,
    pub city: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntityDeletedFromVectorDbEvent {
    pub entity_id: i64,
    pub entity_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorSyncEvent {
    EntitySaved(EntitySavedToVectorDbEvent),
    EntityDeleted(EntityDeletedFromVectorDbEvent),
}

impl VectorSyncEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            VectorSyncEvent::EntitySaved(_) => "ENTITY_SAVED",
            VectorSyncEvent::EntityDeleted(_) => "ENTITY_DELETED",
        }
    }

    /// Partition key, e.g. `Trip:3`.
    pub fn key(&self) -> String {
        match self {
            VectorSyncEvent::EntitySaved(e) => format!("{}:{}", e.entity_type, e.entity_id),
            VectorSyncEvent::EntityDeleted(e) => format!("{}:{}", e.entity_type, e.entity_id),
        }
    }
}
