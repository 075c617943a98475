use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wayfare_core::repository::UserRepository;
use wayfare_core::{CoreError, CoreResult, User, UserRole};
use wayfare_shared::Masked;

use crate::db_error;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    role: String,
    is_locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: Masked(row.email),
            display_name: row.display_name,
            role: row.role.parse::<UserRole>()?,
            is_locked: row.is_locked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "id, email, display_name, role, is_locked, created_at, updated_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: User) -> CoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, role, is_locked, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(user.email.inner())
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.is_locked)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::Conflict("Email already registered".to_string())
            }
            _ => db_error(e),
        })?;

        Ok(user)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(User::try_from).transpose()
    }

    async fn list(&self) -> CoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users ORDER BY created_at", COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn update(&self, user: User) -> CoreResult<User> {
        let result = sqlx::query(
            "UPDATE users SET display_name = $1, role = $2, is_locked = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.is_locked)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("User {}", user.id)));
        }
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
