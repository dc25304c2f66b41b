/// In-memory store
///
/// Keeps users, notes and refresh tokens behind one mutex so that cascade
/// deletes and refresh token rotation are atomic, matching the Postgres
/// schema's behaviour. Used by the test suite and by `application.in_memory`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore};
use crate::domain::{NewNote, NewUser, Note, NoteStore, NoteType, User, UserStore};
use crate::error::{AppError, DatabaseError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    notes: HashMap<Uuid, Note>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|e| DatabaseError::Poisoned(e.to_string()).into())
    }

    /// Number of live refresh token records owned by `user_id`
    pub fn refresh_token_count(&self, user_id: Uuid) -> usize {
        self.lock()
            .map(|t| t.refresh_tokens.values().filter(|r| r.user_id == user_id).count())
            .unwrap_or(0)
    }
}

impl Tables {
    fn has_token(&self, user_id: Uuid, hashed_token: &str) -> bool {
        self.refresh_tokens
            .values()
            .any(|r| r.user_id == user_id && r.hashed_token == hashed_token)
    }

    fn insert_token(&mut self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError> {
        if !self.users.contains_key(&token.user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if self.has_token(token.user_id, &token.hashed_token) {
            return Err(AppError::Conflict("Refresh token already stored".to_string()));
        }
        let record = token.into_record();
        self.refresh_tokens.insert(record.id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
        let user = user.into_user();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.users.values().any(|u| u.email == email))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.id != id && u.email == email) {
            return Err(AppError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
        Ok(tables.users.get_mut(&id).map(|user| {
            user.name = name.map(str::to_string);
            user.email = email.to_string();
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        // ON DELETE CASCADE
        tables.notes.retain(|_, n| n.user_id != id);
        tables.refresh_tokens.retain(|_, r| r.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert(&self, note: NewNote) -> Result<Note, AppError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&note.user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        let note = note.into_note();
        tables.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        let tables = self.lock()?;
        let mut notes: Vec<Note> = tables
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        Ok(self.lock()?.notes.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        note_type: NoteType,
    ) -> Result<Option<Note>, AppError> {
        let mut tables = self.lock()?;
        Ok(tables.notes.get_mut(&id).map(|note| {
            note.title = title.to_string();
            note.content = content.to_string();
            note.note_type = note_type;
            note.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.notes.remove(&id).is_some())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError> {
        self.lock()?.insert_token(token)
    }

    async fn find_by_user_and_digest(
        &self,
        user_id: Uuid,
        hashed_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self
            .lock()?
            .refresh_tokens
            .values()
            .find(|r| r.user_id == user_id && r.hashed_token == hashed_token)
            .cloned())
    }

    async fn delete(&self, record: &RefreshTokenRecord) -> Result<bool, AppError> {
        Ok(self.lock()?.refresh_tokens.remove(&record.id).is_some())
    }

    async fn rotate(
        &self,
        consumed: &RefreshTokenRecord,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let mut tables = self.lock()?;
        let removed = match tables.refresh_tokens.remove(&consumed.id) {
            Some(removed) => removed,
            None => return Ok(None),
        };
        match tables.insert_token(replacement) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Roll back the delete
                tables.refresh_tokens.insert(removed.id, removed);
                Err(e)
            }
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.lock()?;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, r| !r.is_expired_at(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_user() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let user = store
            .create(NewUser {
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (store, user.id)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, _) = store_with_user().await;
        let err = store
            .create(NewUser {
                email: "a@x.com".to_string(),
                password_hash: "other".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rotate_is_single_use() {
        let (store, user_id) = store_with_user().await;
        let first = RefreshTokenStore::insert(
            &store,
            NewRefreshToken::new(user_id, "first".to_string(), 60),
        )
        .await
        .unwrap();

        let second = store
            .rotate(&first, NewRefreshToken::new(user_id, "second".to_string(), 60))
            .await
            .unwrap();
        assert!(second.is_some());

        let again = store
            .rotate(&first, NewRefreshToken::new(user_id, "third".to_string(), 60))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.refresh_token_count(user_id), 1);
        assert!(store
            .find_by_user_and_digest(user_id, "third")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record_once() {
        let (store, user_id) = store_with_user().await;
        let record =
            RefreshTokenStore::insert(&store, NewRefreshToken::new(user_id, "tok".to_string(), 60))
                .await
                .unwrap();

        assert!(RefreshTokenStore::delete(&store, &record).await.unwrap());
        assert!(store
            .find_by_user_and_digest(user_id, "tok")
            .await
            .unwrap()
            .is_none());
        assert!(!RefreshTokenStore::delete(&store, &record).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_user_profile() {
        let (store, user_id) = store_with_user().await;
        let other = store
            .create(NewUser {
                email: "b@x.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let updated = UserStore::update(&store, user_id, Some("Ann"), "ann@x.com")
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(updated.name.as_deref(), Some("Ann"));
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());

        // Keeping one's own email is not a conflict
        assert!(UserStore::update(&store, user_id, None, "ann@x.com").await.unwrap().is_some());

        let err = UserStore::update(&store, user_id, None, &other.email).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(UserStore::update(&store, Uuid::new_v4(), None, "c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_is_scoped_to_user() {
        let (store, user_id) = store_with_user().await;
        RefreshTokenStore::insert(&store, NewRefreshToken::new(user_id, "tok".to_string(), 60))
            .await
            .unwrap();

        assert!(store
            .find_by_user_and_digest(Uuid::new_v4(), "tok")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_user_and_digest(user_id, "tok")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_user_delete_cascades() {
        let (store, user_id) = store_with_user().await;
        RefreshTokenStore::insert(&store, NewRefreshToken::new(user_id, "tok".to_string(), 60))
            .await
            .unwrap();
        NoteStore::insert(
            &store,
            NewNote {
                user_id,
                title: "t".to_string(),
                content: String::new(),
                note_type: NoteType::Text,
            },
        )
        .await
        .unwrap();

        assert!(UserStore::delete(&store, user_id).await.unwrap());
        assert_eq!(store.refresh_token_count(user_id), 0);
        assert!(store.list_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, user_id) = store_with_user().await;
        RefreshTokenStore::insert(&store, NewRefreshToken::new(user_id, "old".to_string(), -10))
            .await
            .unwrap();
        RefreshTokenStore::insert(&store, NewRefreshToken::new(user_id, "new".to_string(), 60))
            .await
            .unwrap();

        let purged = store.purge_expired(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.refresh_token_count(user_id), 1);
        assert_eq!(store.purge_expired(Utc::now() + Duration::seconds(120)).await.unwrap(), 1);
    }
}
