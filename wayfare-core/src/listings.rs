use std::sync::Arc;
use tracing::{error, info};
use wayfare_catalog::Listing;
use wayfare_shared::VectorSyncEvent;

use crate::events::{deleted_event, saved_event};
use crate::repository::{EventOutbox, ListingQuery, ListingRepository, WishlistRepository};
use crate::{ensure_version, CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct PatchListingCommand<P> {
    pub id: i64,
    pub patch: P,
    pub expected_version: Option<i64>,
}

/// Create / read / patch / delete for one listing kind.
pub struct ListingManager<L: Listing> {
    repo: Arc<dyn ListingRepository<L>>,
    wishlist: Arc<dyn WishlistRepository>,
    outbox: Arc<dyn EventOutbox>,
}

impl<L: Listing> ListingManager<L> {
    pub fn new(
        repo: Arc<dyn ListingRepository<L>>,
        wishlist: Arc<dyn WishlistRepository>,
        outbox: Arc<dyn EventOutbox>,
    ) -> Self {
        Self { repo, wishlist, outbox }
    }

    pub async fn create(&self, draft: L::Draft) -> CoreResult<L> {
        let listing = L::from_draft(draft);
        listing.validate()?;

        let saved = self.repo.insert(listing).await?;
        info!("Created {} {}", L::KIND, saved.id());

        notify(self.outbox.as_ref(), saved_event(&saved)).await;
        Ok(saved)
    }

    pub async fn get(&self, id: i64) -> CoreResult<L> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| not_found::<L>(id))
    }

    pub async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<L>> {
        self.repo.list(query).await
    }

    /// Applies a sparse update. Fields absent from the patch keep their
    /// stored value.
    pub async fn patch(&self, cmd: PatchListingCommand<L::Patch>) -> CoreResult<L> {
        let mut listing = self.get(cmd.id).await?;
        ensure_version(L::KIND.as_str(), cmd.id, listing.version(), cmd.expected_version)?;

        listing.apply_patch(&cmd.patch);
        listing.validate()?;
        listing.touch();

        let saved = self.repo.update(listing).await?;
        info!("Patched {} {} (version {})", L::KIND, saved.id(), saved.version());

        notify(self.outbox.as_ref(), saved_event(&saved)).await;
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> CoreResult<()> {
        if !self.repo.delete(id).await? {
            return Err(not_found::<L>(id));
        }

        let flagged = self.wishlist.soft_delete_for_item(id, L::KIND).await?;
        info!("Deleted {} {} ({} wishlist entries flagged)", L::KIND, id, flagged);

        notify(self.outbox.as_ref(), deleted_event(L::KIND, id)).await;
        Ok(())
    }
}

pub(crate) fn not_found<L: Listing>(id: i64) -> CoreError {
    CoreError::NotFound(format!("{} {}", L::KIND, id))
}

/// Queues a notification once the primary write has committed. A failure
/// here does not undo the write; it is logged and the request still succeeds.
pub(crate) async fn notify(outbox: &dyn EventOutbox, event: VectorSyncEvent) {
    if let Err(e) = outbox.enqueue(event.clone()).await {
        error!("Failed to queue {} for {}: {}", event.event_type(), event.key(), e);
    }
}
