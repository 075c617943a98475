use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;
use wayfare_core::repository::{EventOutbox, OutboxRecord, OutboxStatus};
use wayfare_core::{CoreError, CoreResult};
use wayfare_shared::VectorSyncEvent;

use crate::db_error;

/// Transactional outbox backed by the `event_outbox` table. Several relay
/// instances can drain it concurrently; claims skip rows locked by others.
pub struct PgEventOutbox {
    pool: PgPool,
}

impl PgEventOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fails a row that can never be published so lease expiry won't reclaim it.
    async fn park(&self, id: i64, error: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = $1, attempts = attempts + 1, last_error = $2, claimed_at = NULL, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(OutboxStatus::Failed.as_str())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    payload: Value,
    status: String,
    attempts: i32,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxRecord {
    type Error = CoreError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let event: VectorSyncEvent = serde_json::from_value(row.payload)
            .map_err(|e| CoreError::InternalError(format!("Corrupt outbox record {}: {}", row.id, e)))?;
        let status = OutboxStatus::parse(&row.status).ok_or_else(|| {
            CoreError::InternalError(format!("Unknown outbox status {} on record {}", row.status, row.id))
        })?;

        Ok(OutboxRecord {
            id: row.id,
            event,
            status,
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }
}

#[async_trait]
impl EventOutbox for PgEventOutbox {
    async fn enqueue(&self, event: VectorSyncEvent) -> CoreResult<i64> {
        let payload = serde_json::to_value(&event)
            .map_err(|e| CoreError::InternalError(format!("Failed to encode event: {}", e)))?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO event_outbox (event_key, event_type, payload, status, attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(event.key())
        .bind(event.event_type())
        .bind(payload)
        .bind(OutboxStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(id)
    }

    async fn claim_pending(&self, limit: usize, lease: Duration) -> CoreResult<Vec<OutboxRecord>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            UPDATE event_outbox
            SET status = $1, claimed_at = NOW(), updated_at = NOW()
            WHERE id IN (
                SELECT id FROM event_outbox
                WHERE status = $2
                   OR (status = $1 AND claimed_at < NOW() - make_interval(secs => $3))
                ORDER BY id
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, status, attempts, last_error
            "#,
        )
        .bind(OutboxStatus::InFlight.as_str())
        .bind(OutboxStatus::Pending.as_str())
        .bind(lease.as_secs_f64())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match OutboxRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Parking outbox record {}: {}", id, e);
                    self.park(id, &e.to_string()).await?;
                }
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn mark_published(&self, id: i64) -> CoreResult<()> {
        sqlx::query("UPDATE event_outbox SET status = $1, claimed_at = NULL, updated_at = NOW() WHERE id = $2")
            .bind(OutboxStatus::Published.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str, give_up: bool) -> CoreResult<()> {
        let status = if give_up {
            OutboxStatus::Failed
        } else {
            OutboxStatus::Pending
        };

        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = $1, attempts = attempts + 1, last_error = $2, claimed_at = NULL, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
