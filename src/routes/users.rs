use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::domain::{User, UserStore};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::validators::is_valid_email;

const MAX_NAME_LENGTH: usize = 100;

/// User information response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            name: user.name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// GET /api/users/me
pub async fn get_current_user(
    ctx: AuthContext,
    users: web::Data<Arc<dyn UserStore>>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;

    let user = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Profile update request
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

/// PUT /api/users/me
///
/// Replaces the caller's name and email. A blank name clears it.
///
/// # Errors
/// - 400: Invalid email or name too long
/// - 401: Not authenticated
/// - 404: Account no longer exists
/// - 409: Email taken by another account
pub async fn update_current_user(
    ctx: AuthContext,
    form: web::Json<UpdateUserRequest>,
    users: web::Data<Arc<dyn UserStore>>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    let context = ErrorContext::new("user_update").with_user_id(user_id);

    let email = is_valid_email(&form.email).map_err(|e| context.record(e.into()))?;
    let name = form.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if name.map_or(false, |n| n.chars().count() > MAX_NAME_LENGTH) {
        return Err(context.record(
            ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH).into(),
        ));
    }

    let user = users
        .update(user_id, name, &email)
        .await
        .map_err(|e| context.record(e))?
        .ok_or_else(|| context.record(AppError::NotFound("User not found".to_string())))?;

    tracing::info!(request_id = %context.request_id, user_id = %user_id, "User updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// DELETE /api/users/me
///
/// Removes the account together with its notes and refresh tokens.
/// Outstanding access tokens stay valid until they expire, but every
/// refresh attempt now fails with 404.
pub async fn delete_current_user(
    ctx: AuthContext,
    users: web::Data<Arc<dyn UserStore>>,
) -> Result<HttpResponse, AppError> {
    let user_id = ctx.current_user_id()?;
    let context = ErrorContext::new("user_deletion").with_user_id(user_id);

    if !users.delete(user_id).await.map_err(|e| context.record(e))? {
        return Err(context.record(AppError::NotFound("User not found".to_string())));
    }

    tracing::info!(request_id = %context.request_id, user_id = %user_id, "User deleted");
    Ok(HttpResponse::NoContent().finish())
}
