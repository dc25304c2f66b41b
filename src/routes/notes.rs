use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::domain::{NoteDraft, NoteService};
use crate::error::AppError;

/// GET /api/notes
pub async fn list_notes(
    ctx: AuthContext,
    notes: web::Data<NoteService>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    Ok(HttpResponse::Ok().json(notes.list(user_id).await?))
}

/// POST /api/notes
pub async fn create_note(
    ctx: AuthContext,
    body: web::Json<NoteDraft>,
    notes: web::Data<NoteService>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    let note = notes.create(user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(note))
}

/// GET /api/notes/{id}
pub async fn get_note(
    ctx: AuthContext,
    path: web::Path<Uuid>,
    notes: web::Data<NoteService>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    Ok(HttpResponse::Ok().json(notes.get(user_id, path.into_inner()).await?))
}

/// PUT /api/notes/{id}
pub async fn update_note(
    ctx: AuthContext,
    path: web::Path<Uuid>,
    body: web::Json<NoteDraft>,
    notes: web::Data<NoteService>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    let note = notes
        .update(user_id, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(note))
}

/// DELETE /api/notes/{id}
pub async fn delete_note(
    ctx: AuthContext,
    path: web::Path<Uuid>,
    notes: web::Data<NoteService>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    notes.delete(user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
