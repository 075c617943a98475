use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use wayfare_shared::{Masked, Patch};

use crate::repository::UserRepository;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Customer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "CUSTOMER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(UserRole::Customer),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

/// A marketplace account as seen by administrators. Credentials live with
/// the identity provider, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: Masked<String>,
    pub display_name: String,
    pub role: UserRole,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: Masked<String>,
    pub display_name: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserPatch {
    pub display_name: Patch<String>,
    pub role: Patch<UserRole>,
    pub is_locked: Patch<bool>,
}

impl User {
    pub fn apply_patch(&mut self, patch: &UserPatch) {
        patch.display_name.apply_to(&mut self.display_name);
        patch.role.apply_to(&mut self.role);
        patch.is_locked.apply_to(&mut self.is_locked);
    }

    fn validate(&self) -> CoreResult<()> {
        let email = self.email.inner();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(CoreError::ValidationError("email is not valid".to_string()));
        }
        if self.display_name.trim().is_empty() {
            return Err(CoreError::ValidationError("display_name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Admin user management.
pub struct UserManager {
    repo: Arc<dyn UserRepository>,
}

impl UserManager {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new_user: NewUser) -> CoreResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: Masked(new_user.email.into_inner().trim().to_lowercase()),
            display_name: new_user.display_name,
            role: new_user.role.unwrap_or(UserRole::Customer),
            is_locked: false,
            created_at: now,
            updated_at: now,
        };
        user.validate()?;

        let user = self.repo.insert(user).await?;
        info!("User {} created with role {}", user.id, user.role);
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<User> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("User {}", id)))
    }

    pub async fn list(&self) -> CoreResult<Vec<User>> {
        self.repo.list().await
    }

    pub async fn patch(&self, id: Uuid, patch: UserPatch) -> CoreResult<User> {
        let mut user = self.get(id).await?;
        user.apply_patch(&patch);
        user.validate()?;
        user.updated_at = Utc::now();

        let user = self.repo.update(user).await?;
        info!("User {} updated (role {}, locked {})", user.id, user.role, user.is_locked);
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> CoreResult<()> {
        if !self.repo.delete(id).await? {
            return Err(CoreError::NotFound(format!("User {}", id)));
        }
        info!("User {} deleted", id);
        Ok(())
    }
}
