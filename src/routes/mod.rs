mod auth;
mod notes;
mod users;

use actix_web::HttpResponse;

pub use auth::{login, refresh, register, AuthRequest, AuthResponse, RefreshRequest};
pub use notes::{create_note, delete_note, get_note, list_notes, update_note};
pub use users::{
    delete_current_user, get_current_user, update_current_user, UpdateUserRequest, UserResponse,
};

/// GET /health_check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
