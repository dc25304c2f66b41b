/// Refresh Token Store
///
/// Revocation list of outstanding refresh tokens. Only the SHA-256 digest of
/// a raw token is ever persisted. A token is live while its record exists;
/// redeeming it deletes the record and writes its replacement in one
/// transaction (`rotate`).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Row of the `refresh_tokens` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub hashed_token: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Values for a record about to be inserted
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub hashed_token: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    pub fn new(user_id: Uuid, hashed_token: String, lifetime_seconds: i64) -> Self {
        Self {
            user_id,
            hashed_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_seconds),
        }
    }

    pub(crate) fn into_record(self) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            expires_at: self.expires_at,
            hashed_token: self.hashed_token,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync + 'static {
    /// Persist a new record. Several live records per user are allowed.
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError>;

    /// Point lookup scoped to the owning user; `None` is a normal outcome.
    async fn find_by_user_and_digest(
        &self,
        user_id: Uuid,
        hashed_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Remove by identity. Returns false if the record was already gone.
    async fn delete(&self, record: &RefreshTokenRecord) -> Result<bool, AppError>;

    /// Delete `consumed` and insert `replacement` atomically.
    ///
    /// The delete only counts if the record still existed. When another
    /// caller got there first nothing is written and `None` is returned.
    async fn rotate(
        &self,
        consumed: &RefreshTokenRecord,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Drop every record expired at `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_expiry() {
        let token = NewRefreshToken::new(Uuid::new_v4(), "abc".to_string(), 60);
        let record = token.into_record();

        assert!(!record.is_expired_at(Utc::now()));
        assert!(record.is_expired_at(Utc::now() + Duration::seconds(61)));
    }

    #[test]
    fn test_records_get_fresh_ids() {
        let user_id = Uuid::new_v4();
        let a = NewRefreshToken::new(user_id, "abc".to_string(), 60).into_record();
        let b = NewRefreshToken::new(user_id, "abc".to_string(), 60).into_record();
        assert_ne!(a.id, b.id);
    }
}
