use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserStore;
use crate::error::{AppError, ValidationError};

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Text,
    Checklist,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Text => "text",
            NoteType::Checklist => "checklist",
        }
    }
}

impl std::str::FromStr for NoteType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(NoteType::Text),
            "checklist" => Ok(NoteType::Checklist),
            other => Err(AppError::Internal(format!("Unknown note type in store: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
    pub created_at: DateTime<Utc>,
}

/// Validated values for an insert
#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
}

impl NewNote {
    pub(crate) fn into_note(self) -> Note {
        Note {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            note_type: self.note_type,
            created_at: Utc::now(),
        }
    }
}

/// Client-supplied note fields, not yet validated
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub note_type: Option<NoteType>,
}

#[async_trait]
pub trait NoteStore: Send + Sync + 'static {
    /// # Errors
    /// * `NotFound` - the owning user no longer exists
    async fn insert(&self, note: NewNote) -> Result<Note, AppError>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Note>, AppError>;

    /// Replace title, content and type; `None` if the note is gone
    async fn update(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        note_type: NoteType,
    ) -> Result<Option<Note>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Note CRUD scoped to the calling user
#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteStore>,
    users: Arc<dyn UserStore>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteStore>, users: Arc<dyn UserStore>) -> Self {
        Self { notes, users }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        self.notes.list_by_user(user_id).await
    }

    pub async fn get(&self, user_id: Uuid, note_id: Uuid) -> Result<Note, AppError> {
        self.owned_note(user_id, note_id).await
    }

    /// Create a note for `user_id`.
    ///
    /// The owner is looked up first: a user deleted after its access token was
    /// issued gets `NotFound` instead of a foreign key failure.
    pub async fn create(&self, user_id: Uuid, draft: NoteDraft) -> Result<Note, AppError> {
        let (title, note_type) = validate_draft(&draft)?;

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let note = self
            .notes
            .insert(NewNote {
                user_id,
                title,
                content: draft.content,
                note_type,
            })
            .await?;

        tracing::info!(user_id = %user_id, note_id = %note.id, "Note created");
        Ok(note)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        note_id: Uuid,
        draft: NoteDraft,
    ) -> Result<Note, AppError> {
        let (title, note_type) = validate_draft(&draft)?;
        self.owned_note(user_id, note_id).await?;

        self.notes
            .update(note_id, &title, &draft.content, note_type)
            .await?
            .ok_or_else(|| AppError::NotFound("Note with such ID does not exist".to_string()))
    }

    pub async fn delete(&self, user_id: Uuid, note_id: Uuid) -> Result<(), AppError> {
        self.owned_note(user_id, note_id).await?;

        if !self.notes.delete(note_id).await? {
            return Err(AppError::NotFound("Note with such ID does not exist".to_string()));
        }
        tracing::info!(user_id = %user_id, note_id = %note_id, "Note deleted");
        Ok(())
    }

    async fn owned_note(&self, user_id: Uuid, note_id: Uuid) -> Result<Note, AppError> {
        let note = self
            .notes
            .find_by_id(note_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Note with such ID does not exist".to_string()))?;

        if note.user_id != user_id {
            tracing::warn!(user_id = %user_id, note_id = %note_id, "Access to foreign note refused");
            return Err(AppError::Forbidden("User is not the owner of this note".to_string()));
        }
        Ok(note)
    }
}

fn validate_draft(draft: &NoteDraft) -> Result<(String, NoteType), AppError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyField("title".to_string()).into());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong("title".to_string(), MAX_TITLE_LENGTH).into());
    }
    let note_type = draft
        .note_type
        .ok_or_else(|| ValidationError::InvalidFormat("note_type".to_string()))?;

    Ok((title.to_string(), note_type))
}
