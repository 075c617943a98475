use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::marker::PhantomData;
use tracing::debug;
use wayfare_catalog::{Listing, ListingKind};
use wayfare_core::repository::{ListingQuery, ListingRepository};
use wayfare_core::{CoreError, CoreResult};

use crate::db_error;

/// Every listing kind lives in the `listings` table. Scalar fields are kept
/// as a JSONB body; the filterable facets are mirrored into columns.
pub struct PgListingRepository<L> {
    pool: PgPool,
    _kind: PhantomData<fn() -> L>,
}

impl<L: Listing> PgListingRepository<L> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ListingRow {
    id: i64,
    version: i64,
    body: Value,
}

impl ListingRow {
    pub(crate) fn decode<L: Listing>(self) -> CoreResult<L> {
        let mut listing: L = serde_json::from_value(self.body).map_err(|e| {
            CoreError::InternalError(format!("Corrupt {} row {}: {}", L::KIND, self.id, e))
        })?;
        listing.set_id(self.id);
        listing.set_version(self.version);
        Ok(listing)
    }
}

fn encode<L: Listing>(listing: &L) -> CoreResult<Value> {
    serde_json::to_value(listing)
        .map_err(|e| CoreError::InternalError(format!("Failed to encode {}: {}", L::KIND, e)))
}

/// Inserts the scalar row and returns the listing with its id and version 1.
pub(crate) async fn insert_row<L: Listing>(conn: &mut PgConnection, mut listing: L) -> CoreResult<L> {
    listing.set_version(1);
    let body = encode(&listing)?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO listings (kind, version, is_featured, city, status, body, created_at, updated_at)
        VALUES ($1, 1, $2, $3, $4, $5, $6, $6)
        RETURNING id
        "#,
    )
    .bind(L::KIND.as_str())
    .bind(listing.is_featured())
    .bind(listing.city())
    .bind(listing.status())
    .bind(body)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;

    listing.set_id(id);
    Ok(listing)
}

pub(crate) async fn fetch_row<L: Listing>(conn: &mut PgConnection, id: i64) -> CoreResult<Option<L>> {
    let row: Option<ListingRow> =
        sqlx::query_as("SELECT id, version, body FROM listings WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(L::KIND.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;

    row.map(|r| r.decode::<L>()).transpose()
}

/// Writes the scalar row back when the stored version still matches the
/// listing's, bumping it. Returns the listing carrying the new version.
pub(crate) async fn update_row<L: Listing>(conn: &mut PgConnection, mut listing: L) -> CoreResult<L> {
    let body = encode(&listing)?;

    let bumped: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE listings
        SET version = version + 1, is_featured = $1, city = $2, status = $3, body = $4, updated_at = $5
        WHERE id = $6 AND kind = $7 AND version = $8
        RETURNING version
        "#,
    )
    .bind(listing.is_featured())
    .bind(listing.city())
    .bind(listing.status())
    .bind(body)
    .bind(Utc::now())
    .bind(listing.id())
    .bind(L::KIND.as_str())
    .bind(listing.version())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    match bumped {
        Some((version,)) => {
            listing.set_version(version);
            Ok(listing)
        }
        None => Err(stale_or_missing(conn, L::KIND, listing.id(), listing.version()).await),
    }
}

async fn stale_or_missing(conn: &mut PgConnection, kind: ListingKind, id: i64, version: i64) -> CoreError {
    let stored: Result<Option<(i64,)>, sqlx::Error> =
        sqlx::query_as("SELECT version FROM listings WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(kind.as_str())
            .fetch_optional(&mut *conn)
            .await;

    match stored {
        Ok(Some((stored,))) => CoreError::Conflict(format!(
            "{} {} was modified concurrently (stored version {}, saving version {})",
            kind, id, stored, version
        )),
        Ok(None) => CoreError::NotFound(format!("{} {}", kind, id)),
        Err(e) => db_error(e),
    }
}

pub(crate) async fn delete_row(conn: &mut PgConnection, kind: ListingKind, id: i64) -> CoreResult<bool> {
    let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND kind = $2")
        .bind(id)
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_rows<L: Listing>(pool: &PgPool, query: &ListingQuery) -> CoreResult<Vec<L>> {
    let rows: Vec<ListingRow> = sqlx::query_as(
        r#"
        SELECT id, version, body FROM listings
        WHERE kind = $1
          AND ($2::BOOLEAN IS NULL OR is_featured = $2)
          AND ($3::TEXT IS NULL OR LOWER(city) = LOWER($3))
          AND ($4::TEXT IS NULL OR status = $4)
        ORDER BY id
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(L::KIND.as_str())
    .bind(query.featured)
    .bind(query.city.as_deref())
    .bind(query.status.as_deref())
    .bind(i64::from(query.limit()))
    .bind(i64::from(query.offset()))
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    debug!("Listed {} {} rows", rows.len(), L::KIND);
    rows.into_iter().map(|r| r.decode::<L>()).collect()
}

#[async_trait]
impl<L: Listing> ListingRepository<L> for PgListingRepository<L> {
    async fn insert(&self, listing: L) -> CoreResult<L> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        insert_row(&mut conn, listing).await
    }

    async fn get(&self, id: i64) -> CoreResult<Option<L>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_row(&mut conn, id).await
    }

    async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<L>> {
        list_rows(&self.pool, query).await
    }

    async fn update(&self, listing: L) -> CoreResult<L> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        update_row(&mut conn, listing).await
    }

    async fn delete(&self, id: i64) -> CoreResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        delete_row(&mut conn, L::KIND, id).await
    }
}
