use async_trait::async_trait;
use tracing::info;
use wayfare_catalog::{Listing, ListingKind};
use wayfare_shared::{EntityDeletedFromVectorDbEvent, EntitySavedToVectorDbEvent, VectorSyncEvent};

use crate::repository::EventPublisher;
use crate::CoreResult;

pub fn saved_event<L: Listing>(listing: &L) -> VectorSyncEvent {
    VectorSyncEvent::EntitySaved(EntitySavedToVectorDbEvent {
        entity_id: listing.id(),
        entity_type: L::KIND.to_string(),
        text: listing.synopsis(),
        name: listing.name().to_string(),
        price_cents: listing.price_cents(),
        city: listing.city().to_string(),
    })
}

pub fn deleted_event(kind: ListingKind, id: i64) -> VectorSyncEvent {
    VectorSyncEvent::EntityDeleted(EntityDeletedFromVectorDbEvent {
        entity_id: id,
        entity_type: kind.to_string(),
    })
}

/// Publisher used when no broker is configured: events only reach the logs.
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &VectorSyncEvent) -> CoreResult<()> {
        info!("Vector sync event {} for {}", event.event_type(), event.key());
        Ok(())
    }
}
