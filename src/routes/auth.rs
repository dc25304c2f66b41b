/// Authentication Routes
///
/// Registration, login and token refresh. Handlers only translate between
/// JSON and `AuthService`; status codes come from `AppError`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, TokenKind, TokenPair};
use crate::error::{AppError, ErrorContext};

/// Register and login request
#[derive(Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

/// Token pair response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, auth: &AuthService) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: auth.codec().lifetime(TokenKind::Access),
        }
    }
}

/// POST /auth/register
///
/// Creates the account; no tokens are returned.
///
/// # Errors
/// - 400: Invalid email or empty password
/// - 409: Email already registered
pub async fn register(
    form: web::Json<AuthRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    auth.register(&form.email, &form.password)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Created().finish())
}

/// POST /auth/login
///
/// # Errors
/// - 400: Invalid email format
/// - 401: Wrong password
/// - 404: No such account
///
/// Both 401 and 404 carry the same message body.
pub async fn login(
    form: web::Json<AuthRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let pair = auth
        .login(&form.email, &form.password)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, &auth)))
}

/// POST /auth/refresh
///
/// Redeems a refresh token; the presented token stops working.
///
/// # Errors
/// - 401: Invalid, replayed or unknown refresh token
/// - 403: Refresh token expired
/// - 404: Owning user no longer exists
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let pair = auth
        .refresh(&form.refresh_token)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, &auth)))
}
