use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Row of the `users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub(crate) fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            name: None,
            password_hash: self.password_hash,
            created_at: Utc::now(),
        }
    }
}

/// User persistence as seen by the authentication core.
///
/// Deleting a user must also delete its refresh tokens and notes.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// # Errors
    /// * `Conflict` - the email is already registered
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Replace name and email; `None` if the user is gone
    ///
    /// # Errors
    /// * `Conflict` - the email belongs to another user
    async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: &str,
    ) -> Result<Option<User>, AppError>;

    /// Returns false if no such user existed
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
