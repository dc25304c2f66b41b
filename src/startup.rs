use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthService, HashEncoder, RefreshTokenStore, TokenCodec};
use crate::configuration::JwtSettings;
use crate::domain::NoteService;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_note, delete_current_user, delete_note, get_current_user, get_note, health_check,
    list_notes, login, refresh, register, update_current_user, update_note,
};
use crate::store::Stores;

pub fn run(
    listener: TcpListener,
    stores: Stores,
    jwt_config: JwtSettings,
    hash_cost: u32,
) -> Result<Server, std::io::Error> {
    let hasher = HashEncoder::new(hash_cost)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let codec = Arc::new(TokenCodec::new(&jwt_config));

    let auth_service = web::Data::new(AuthService::new(
        stores.users.clone(),
        stores.refresh_tokens.clone(),
        codec.clone(),
        hasher,
    ));
    let note_service = web::Data::new(NoteService::new(stores.notes.clone(), stores.users.clone()));
    let users = web::Data::new(stores.users.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Last registered wraps outermost: the request logger wraps the
            // token filter and reads the attached identity from the request
            // extensions once the inner service has returned
            .wrap(JwtMiddleware::new(codec.clone()))
            .wrap(LoggerMiddleware)
            .wrap(Logger::default())
            .app_data(json_config())
            .app_data(path_config())
            .app_data(auth_service.clone())
            .app_data(note_service.clone())
            .app_data(users.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh)),
            )
            // Protected routes; handlers answer 401 without an identity
            .service(
                web::scope("/api")
                    .route("/users/me", web::get().to(get_current_user))
                    .route("/users/me", web::put().to(update_current_user))
                    .route("/users/me", web::delete().to(delete_current_user))
                    .route("/notes", web::get().to(list_notes))
                    .route("/notes", web::post().to(create_note))
                    .route("/notes/{id}", web::get().to(get_note))
                    .route("/notes/{id}", web::put().to(update_note))
                    .route("/notes/{id}", web::delete().to(delete_note)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Malformed or mistyped JSON bodies become the standard 400 error body
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        AppError::from(ValidationError::InvalidFormat("request body".to_string())).into()
    })
}

/// Unparseable resource ids cannot name an existing resource
fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|_err, _req| AppError::NotFound("Resource not found".to_string()).into())
}

/// Periodically deletes expired refresh tokens.
///
/// Expired rows are already rejected at refresh time; this only keeps the
/// table from growing without bound.
pub fn spawn_refresh_token_purge(store: Arc<dyn RefreshTokenStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "Refresh token purge failed"),
            }
        }
    });
}
