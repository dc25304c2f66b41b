/// Authentication Core
///
/// Registration, login and refresh token rotation. Composes the hash encoder,
/// the token codec, the refresh token store and the user store; every outcome
/// is an `AppError` value for the HTTP layer to map.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{validate_password, HashEncoder};
use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenStore};
use crate::domain::{NewUser, UserStore};
use crate::error::{AppError, AuthError};
use crate::validators::is_valid_email;

/// Access and refresh token handed to the client exactly once
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
    hasher: HashEncoder,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        hasher: HashEncoder,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            codec,
            hasher,
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// Create an account. No tokens are issued.
    ///
    /// # Errors
    /// * `Validation` - malformed email or password
    /// * `Conflict` - email already registered
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AppError> {
        let email = is_valid_email(email)?;
        validate_password(password)?;

        if self.users.exists_by_email(&email).await? {
            return Err(AppError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let password_hash =
            tokio::task::spawn_blocking(move || hasher.encode(&password)).await??;

        // A concurrent registration can still win the race; the store
        // reports it as Conflict through the unique constraint.
        let user = self.users.create(NewUser { email, password_hash }).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(())
    }

    /// Check credentials and issue a fresh token pair.
    ///
    /// Other sessions of the same user are left untouched.
    ///
    /// # Errors
    /// * `Auth(UnknownAccount)` - no user with this email
    /// * `Auth(InvalidCredentials)` - wrong password
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = is_valid_email(email)?;
        let user = self.users.find_by_email(&email).await?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password_ok = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.matches(&password, &hash),
            None => {
                hasher.burn(&password);
                false
            }
        })
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                tracing::info!("Login attempt for unknown account");
                return Err(AuthError::UnknownAccount.into());
            }
        };

        if !password_ok {
            tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let (pair, stored) = self.mint_pair(user.id)?;
        self.refresh_tokens.insert(stored).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Redeem a refresh token for a new pair.
    ///
    /// The redeemed token's record is deleted and the replacement's record
    /// inserted in one transaction, so each refresh token works exactly once.
    ///
    /// # Errors
    /// * `Auth(TokenInvalid)` - bad signature, wrong kind, expired, unknown or
    ///   already redeemed
    /// * `NotFound` - the token's user has been deleted
    /// * `Auth(RefreshTokenExpired)` - the stored record is past its expiry
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, AppError> {
        if !self.codec.validate(raw_refresh_token, TokenKind::Refresh) {
            return Err(AuthError::TokenInvalid.into());
        }

        let user_id = self
            .codec
            .subject_of(raw_refresh_token)
            .ok_or(AuthError::TokenInvalid)?;

        if self.users.find_by_id(user_id).await?.is_none() {
            tracing::info!(user_id = %user_id, "Refresh for deleted user");
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let digest = self.codec.digest(raw_refresh_token);
        let record = match self
            .refresh_tokens
            .find_by_user_and_digest(user_id, &digest)
            .await?
        {
            Some(record) => record,
            None => {
                tracing::warn!(user_id = %user_id, "Refresh token not recognized, possible replay");
                return Err(AuthError::TokenInvalid.into());
            }
        };

        if record.is_expired_at(Utc::now()) {
            tracing::info!(user_id = %user_id, "Refresh token expired");
            return Err(AuthError::RefreshTokenExpired.into());
        }

        let (pair, replacement) = self.mint_pair(user_id)?;
        if self.refresh_tokens.rotate(&record, replacement).await?.is_none() {
            tracing::warn!(user_id = %user_id, "Refresh token redeemed concurrently");
            return Err(AuthError::TokenInvalid.into());
        }

        tracing::info!(user_id = %user_id, "Token refreshed");
        Ok(pair)
    }

    /// Sign a new pair and prepare the refresh token's store record
    fn mint_pair(&self, user_id: Uuid) -> Result<(TokenPair, NewRefreshToken), AppError> {
        let access_token = self.codec.issue(user_id, TokenKind::Access)?;
        let refresh_token = self.codec.issue(user_id, TokenKind::Refresh)?;

        let stored = NewRefreshToken::new(
            user_id,
            self.codec.digest(&refresh_token),
            self.codec.lifetime(TokenKind::Refresh),
        );

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            stored,
        ))
    }
}
