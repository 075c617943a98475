use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, info};
use wayfare_catalog::{Activity, ItineraryDay, ListingKind, Trip, UserReview};
use wayfare_core::repository::{ListingQuery, ListingRepository, TripInclude, TripRepository};
use wayfare_core::CoreResult;

use crate::db_error;
use crate::listing_repo::{delete_row, fetch_row, insert_row, list_rows, update_row};

/// Trips keep their scalar row in `listings`; reviews, itinerary days and
/// activities live in their own tables. Child rows are never removed by a
/// foreign-key cascade, only by the explicit deletes below.
pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    user_id: String,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DayRow {
    id: i64,
    day_number: i32,
    title: String,
    description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    day_id: i64,
    time_of_day: Option<String>,
    title: String,
    description: Option<String>,
}

fn scalars(trip: &Trip) -> Trip {
    let mut trip = trip.clone();
    trip.clear_children();
    trip
}

fn persisted_ids<T>(items: &[T], id: impl Fn(&T) -> i64) -> Vec<i64> {
    items.iter().map(id).filter(|id| *id > 0).collect()
}

async fn load_reviews(conn: &mut PgConnection, trip_id: i64) -> CoreResult<Vec<UserReview>> {
    let rows: Vec<ReviewRow> = sqlx::query_as(
        "SELECT id, user_id, rating, comment, created_at FROM trip_reviews WHERE trip_id = $1 ORDER BY id",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|r| UserReview {
            id: r.id,
            user_id: r.user_id,
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        })
        .collect())
}

async fn load_itinerary(conn: &mut PgConnection, trip_id: i64) -> CoreResult<Vec<ItineraryDay>> {
    let days: Vec<DayRow> = sqlx::query_as(
        "SELECT id, day_number, title, description FROM itinerary_days WHERE trip_id = $1 ORDER BY day_number, id",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let activities: Vec<ActivityRow> = sqlx::query_as(
        r#"
        SELECT a.id, a.day_id, a.time_of_day, a.title, a.description
        FROM itinerary_activities a
        JOIN itinerary_days d ON d.id = a.day_id
        WHERE d.trip_id = $1
        ORDER BY a.day_id, a.position, a.id
        "#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let mut by_day: HashMap<i64, Vec<Activity>> = HashMap::new();
    for a in activities {
        by_day.entry(a.day_id).or_default().push(Activity {
            id: a.id,
            time: a.time_of_day,
            title: a.title,
            description: a.description,
        });
    }

    Ok(days
        .into_iter()
        .map(|d| ItineraryDay {
            activities: by_day.remove(&d.id).unwrap_or_default(),
            id: d.id,
            day_number: d.day_number,
            title: d.title,
            description: d.description,
        })
        .collect())
}

/// Makes the stored reviews of a trip match `reviews`. Reviews are
/// immutable once written, so only inserts and deletes happen.
async fn sync_reviews(conn: &mut PgConnection, trip_id: i64, reviews: &mut [UserReview]) -> CoreResult<()> {
    let keep = persisted_ids(reviews, |r| r.id);
    let removed = sqlx::query("DELETE FROM trip_reviews WHERE trip_id = $1 AND NOT (id = ANY($2))")
        .bind(trip_id)
        .bind(&keep)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?
        .rows_affected();

    for review in reviews.iter_mut().filter(|r| r.id == 0) {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO trip_reviews (trip_id, user_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(trip_id)
        .bind(&review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;
        review.id = id;
    }

    debug!("Trip {} reviews synced ({} removed)", trip_id, removed);
    Ok(())
}

/// Makes the stored itinerary of a trip match `days`, activities included.
async fn sync_itinerary(conn: &mut PgConnection, trip_id: i64, days: &mut [ItineraryDay]) -> CoreResult<()> {
    let keep_days = persisted_ids(days, |d| d.id);
    let keep_activities: Vec<i64> = days
        .iter()
        .flat_map(|d| persisted_ids(&d.activities, |a| a.id))
        .collect();

    sqlx::query(
        r#"
        DELETE FROM itinerary_activities
        WHERE day_id IN (SELECT id FROM itinerary_days WHERE trip_id = $1)
          AND NOT (id = ANY($2))
        "#,
    )
    .bind(trip_id)
    .bind(&keep_activities)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    sqlx::query("DELETE FROM itinerary_days WHERE trip_id = $1 AND NOT (id = ANY($2))")
        .bind(trip_id)
        .bind(&keep_days)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    for day in days.iter_mut() {
        if day.id == 0 {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO itinerary_days (trip_id, day_number, title, description) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(trip_id)
            .bind(day.day_number)
            .bind(&day.title)
            .bind(&day.description)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error)?;
            day.id = id;
        } else {
            sqlx::query("UPDATE itinerary_days SET day_number = $1, title = $2, description = $3 WHERE id = $4 AND trip_id = $5")
                .bind(day.day_number)
                .bind(&day.title)
                .bind(&day.description)
                .bind(day.id)
                .bind(trip_id)
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
        }

        for (position, activity) in day.activities.iter_mut().enumerate() {
            let position = position as i32;
            if activity.id == 0 {
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO itinerary_activities (day_id, position, time_of_day, title, description)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(day.id)
                .bind(position)
                .bind(&activity.time)
                .bind(&activity.title)
                .bind(&activity.description)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_error)?;
                activity.id = id;
            } else {
                sqlx::query(
                    r#"
                    UPDATE itinerary_activities
                    SET day_id = $1, position = $2, time_of_day = $3, title = $4, description = $5
                    WHERE id = $6
                    "#,
                )
                .bind(day.id)
                .bind(position)
                .bind(&activity.time)
                .bind(&activity.title)
                .bind(&activity.description)
                .bind(activity.id)
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
            }
        }
    }

    Ok(())
}

async fn delete_children(conn: &mut PgConnection, trip_id: i64) -> CoreResult<()> {
    sqlx::query(
        "DELETE FROM itinerary_activities WHERE day_id IN (SELECT id FROM itinerary_days WHERE trip_id = $1)",
    )
    .bind(trip_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    sqlx::query("DELETE FROM itinerary_days WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    sqlx::query("DELETE FROM trip_reviews WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(())
}

#[async_trait]
impl ListingRepository<Trip> for PgTripRepository {
    async fn insert(&self, mut trip: Trip) -> CoreResult<Trip> {
        let mut reviews = std::mem::take(&mut trip.user_reviews);
        let mut itinerary = std::mem::take(&mut trip.itinerary);

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut saved = insert_row(&mut tx, trip).await?;
        sync_reviews(&mut tx, saved.id, &mut reviews).await?;
        sync_itinerary(&mut tx, saved.id, &mut itinerary).await?;
        tx.commit().await.map_err(db_error)?;

        saved.user_reviews = reviews;
        saved.itinerary = itinerary;
        Ok(saved)
    }

    async fn get(&self, id: i64) -> CoreResult<Option<Trip>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_row(&mut conn, id).await
    }

    async fn list(&self, query: &ListingQuery) -> CoreResult<Vec<Trip>> {
        list_rows(&self.pool, query).await
    }

    async fn update(&self, trip: Trip) -> CoreResult<Trip> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        update_row(&mut conn, scalars(&trip)).await
    }

    async fn delete(&self, id: i64) -> CoreResult<bool> {
        self.delete_with_children(id).await
    }
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn get_with_children(&self, id: i64, include: TripInclude) -> CoreResult<Option<Trip>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut trip) = fetch_row::<Trip>(&mut tx, id).await? else {
            return Ok(None);
        };

        if include.reviews {
            trip.user_reviews = load_reviews(&mut tx, id).await?;
        }
        if include.itinerary {
            trip.itinerary = load_itinerary(&mut tx, id).await?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(Some(trip))
    }

    async fn save_aggregate(&self, mut trip: Trip, include: TripInclude) -> CoreResult<Trip> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut saved = update_row(&mut tx, scalars(&trip)).await?;

        if include.reviews {
            sync_reviews(&mut tx, saved.id, &mut trip.user_reviews).await?;
            saved.user_reviews = trip.user_reviews;
        }
        if include.itinerary {
            sync_itinerary(&mut tx, saved.id, &mut trip.itinerary).await?;
            saved.itinerary = trip.itinerary;
        }
        tx.commit().await.map_err(db_error)?;

        debug!("Trip {} saved at version {}", saved.id, saved.version);
        Ok(saved)
    }

    async fn delete_with_children(&self, id: i64) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        delete_children(&mut tx, id).await?;
        let deleted = delete_row(&mut tx, ListingKind::Trip, id).await?;
        tx.commit().await.map_err(db_error)?;

        if deleted {
            info!("Trip {} deleted with its reviews and itinerary", id);
        }
        Ok(deleted)
    }
}
