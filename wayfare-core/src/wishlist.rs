use std::sync::Arc;
use tracing::info;
use wayfare_catalog::{ListingKind, WishlistItem};

use crate::repository::WishlistRepository;
use crate::{CoreError, CoreResult};

pub struct WishlistManager {
    repo: Arc<dyn WishlistRepository>,
}

impl WishlistManager {
    pub fn new(repo: Arc<dyn WishlistRepository>) -> Self {
        Self { repo }
    }

    /// Saves a listing for the user. Adding an entry that already exists
    /// returns it unchanged; an entry flagged deleted is revived.
    pub async fn add(&self, user_id: &str, item_id: i64, item_type: ListingKind) -> CoreResult<WishlistItem> {
        match self.repo.find(user_id, item_id, item_type).await? {
            Some(existing) if !existing.is_deleted => Ok(existing),
            Some(mut existing) => {
                existing.is_deleted = false;
                self.repo.save(existing).await
            }
            None => {
                let item = self
                    .repo
                    .save(WishlistItem::new(user_id.to_string(), item_id, item_type))
                    .await?;
                info!("Wishlist entry {} added: {} {}", item.id, item_type, item_id);
                Ok(item)
            }
        }
    }

    pub async fn list(&self, user_id: &str) -> CoreResult<Vec<WishlistItem>> {
        self.repo.list_for_user(user_id).await
    }

    /// Hard-deletes the user's entry for a listing.
    pub async fn remove(&self, user_id: &str, item_id: i64, item_type: ListingKind) -> CoreResult<()> {
        let item = self
            .repo
            .find(user_id, item_id, item_type)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("Wishlist item {} {} for user {}", item_type, item_id, user_id))
            })?;

        self.repo.remove(item.id).await?;
        info!("Wishlist entry {} removed", item.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryWishlistRepository;

    fn manager() -> (WishlistManager, Arc<InMemoryWishlistRepository>) {
        let repo = Arc::new(InMemoryWishlistRepository::new());
        (WishlistManager::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_remove_missing_item_is_not_found() {
        let (manager, repo) = manager();
        manager.add("u1", 5, ListingKind::Hotel).await.unwrap();

        let result = manager.remove("u1", 5, ListingKind::Car).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));

        // nothing else was touched
        assert_eq!(repo.list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_hard_deletes() {
        let (manager, repo) = manager();
        manager.add("u1", 5, ListingKind::Car).await.unwrap();

        manager.remove("u1", 5, ListingKind::Car).await.unwrap();

        assert!(repo.find("u1", 5, ListingKind::Car).await.unwrap().is_none());
        assert!(manager.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_revives() {
        let (manager, repo) = manager();
        let first = manager.add("u1", 8, ListingKind::Trip).await.unwrap();
        let second = manager.add("u1", 8, ListingKind::Trip).await.unwrap();
        assert_eq!(first.id, second.id);

        repo.soft_delete_for_item(8, ListingKind::Trip).await.unwrap();
        assert!(manager.list("u1").await.unwrap().is_empty());

        let revived = manager.add("u1", 8, ListingKind::Trip).await.unwrap();
        assert_eq!(revived.id, first.id);
        assert!(!revived.is_deleted);
        assert_eq!(manager.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lists_are_per_user() {
        let (manager, _) = manager();
        manager.add("u1", 1, ListingKind::Car).await.unwrap();
        manager.add("u2", 1, ListingKind::Car).await.unwrap();
        manager.add("u2", 2, ListingKind::Hotel).await.unwrap();

        assert_eq!(manager.list("u1").await.unwrap().len(), 1);
        assert_eq!(manager.list("u2").await.unwrap().len(), 2);
    }
}
