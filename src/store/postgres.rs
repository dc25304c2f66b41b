/// Postgres store
///
/// Runtime-checked `sqlx` queries against the schema in `migrations/`.
/// Cascade deletes are enforced by the foreign keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore};
use crate::domain::{NewNote, NewUser, Note, NoteStore, NoteType, User, UserStore};
use crate::error::{sqlstate, AppError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    note_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NoteRow> for Note {
    type Error = AppError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        Ok(Note {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            note_type: row.note_type.parse()?,
            created_at: row.created_at,
        })
    }
}

/// The only unique constraint on `users` is the email
fn email_conflict(e: sqlx::Error) -> AppError {
    if sqlstate(&e).as_deref() == Some(UNIQUE_VIOLATION) {
        AppError::Conflict("A user with this email already exists".to_string())
    } else {
        AppError::from(e)
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, created_at";
const NOTE_COLUMNS: &str = "id, user_id, title, content, note_type, created_at";
const TOKEN_COLUMNS: &str = "id, user_id, expires_at, hashed_token, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let user = user.into_user();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(email_conflict)?;

        Ok(user)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, email = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_conflict)?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn insert(&self, note: NewNote) -> Result<Note, AppError> {
        let note = note.into_note();

        sqlx::query(
            r#"
            INSERT INTO notes (id, user_id, title, content, note_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.note_type.as_str())
        .bind(note.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Owner deleted between the existence check and the insert
            if sqlstate(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                AppError::NotFound("User not found".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        Ok(note)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        let rows = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {} FROM notes WHERE user_id = $1 ORDER BY created_at",
            NOTE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Note::try_from).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {} FROM notes WHERE id = $1",
            NOTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Note::try_from).transpose()
    }

    async fn update(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        note_type: NoteType,
    ) -> Result<Option<Note>, AppError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            r#"
            UPDATE notes SET title = $2, content = $3, note_type = $4
            WHERE id = $1
            RETURNING {}
            "#,
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(note_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Note::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError> {
        let record = token.into_record();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, expires_at, hashed_token, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.expires_at)
        .bind(&record.hashed_token)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_user_and_digest(
        &self,
        user_id: Uuid,
        hashed_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {} FROM refresh_tokens WHERE user_id = $1 AND hashed_token = $2",
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .bind(hashed_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, record: &RefreshTokenRecord) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate(
        &self,
        consumed: &RefreshTokenRecord,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent rotation of the same row blocks here until the other
        // transaction commits, then sees zero rows.
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(consumed.id)
            .execute(&mut tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = replacement.into_record();
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, expires_at, hashed_token, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.expires_at)
        .bind(&record.hashed_token)
        .bind(record.created_at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
