use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use wayfare_catalog::{ListingKind, WishlistItem};
use wayfare_core::repository::WishlistRepository;
use wayfare_core::{CoreError, CoreResult};

use crate::db_error;

pub struct PgWishlistRepository {
    pool: PgPool,
}

impl PgWishlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    id: i64,
    user_id: String,
    item_id: i64,
    item_type: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<WishlistRow> for WishlistItem {
    type Error = CoreError;

    fn try_from(row: WishlistRow) -> Result<Self, Self::Error> {
        Ok(WishlistItem {
            id: row.id,
            user_id: row.user_id,
            item_id: row.item_id,
            item_type: row.item_type.parse::<ListingKind>()?,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = "id, user_id, item_id, item_type, is_deleted, created_at";

#[async_trait]
impl WishlistRepository for PgWishlistRepository {
    async fn find(
        &self,
        user_id: &str,
        item_id: i64,
        item_type: ListingKind,
    ) -> CoreResult<Option<WishlistItem>> {
        let row: Option<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wishlist_items WHERE user_id = $1 AND item_id = $2 AND item_type = $3",
            COLUMNS
        ))
        .bind(user_id)
        .bind(item_id)
        .bind(item_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(WishlistItem::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<WishlistItem>> {
        let rows: Vec<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wishlist_items WHERE user_id = $1 AND NOT is_deleted ORDER BY created_at DESC, id DESC",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(WishlistItem::try_from).collect()
    }

    async fn save(&self, item: WishlistItem) -> CoreResult<WishlistItem> {
        if item.id == 0 {
            let row: WishlistRow = sqlx::query_as(&format!(
                r#"
                INSERT INTO wishlist_items (user_id, item_id, item_type, is_deleted, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {}
                "#,
                COLUMNS
            ))
            .bind(&item.user_id)
            .bind(item.item_id)
            .bind(item.item_type.as_str())
            .bind(item.is_deleted)
            .bind(item.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    CoreError::Conflict("Item is already in the wishlist".to_string())
                }
                _ => db_error(e),
            })?;
            return row.try_into();
        }

        let row: Option<WishlistRow> = sqlx::query_as(&format!(
            "UPDATE wishlist_items SET is_deleted = $1, created_at = $2 WHERE id = $3 RETURNING {}",
            COLUMNS
        ))
        .bind(item.is_deleted)
        .bind(item.created_at)
        .bind(item.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.ok_or_else(|| CoreError::NotFound(format!("Wishlist item {}", item.id)))?
            .try_into()
    }

    async fn remove(&self, id: i64) -> CoreResult<()> {
        sqlx::query("DELETE FROM wishlist_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn soft_delete_for_item(&self, item_id: i64, item_type: ListingKind) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE wishlist_items SET is_deleted = TRUE WHERE item_id = $1 AND item_type = $2 AND NOT is_deleted",
        )
        .bind(item_id)
        .bind(item_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
