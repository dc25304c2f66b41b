/// JWT Token Codec
///
/// Signs and verifies the bearer tokens handed out by the service and
/// derives the deterministic digest under which refresh tokens are stored.
/// Parse failures never escape this module: they come back as `None` or
/// `false` and callers treat the token as absent.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Process-wide token signer/verifier, built once from `JwtSettings`
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_lifetime: i64,
    refresh_lifetime: i64,
    leeway: u64,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate` so that `parse` can still read the subject
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[&config.issuer]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_lifetime: config.access_token_expiry,
            refresh_lifetime: config.refresh_token_expiry,
            leeway: config.leeway,
        }
    }

    /// Lifetime in seconds of tokens of `kind`
    pub fn lifetime(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_lifetime,
            TokenKind::Refresh => self.refresh_lifetime,
        }
    }

    /// Sign a new token of `kind` for `user_id`, issued now
    ///
    /// # Errors
    /// Returns error if token encoding fails
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        self.issue_at(user_id, kind, chrono::Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        issued_at: i64,
    ) -> Result<String, AppError> {
        let claims = Claims::new(
            user_id,
            kind,
            issued_at,
            self.lifetime(kind),
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify signature and structure and return the claims.
    ///
    /// A leading `Bearer ` is ignored. Does not check expiry.
    pub fn parse(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(bare(token), &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("JWT parse error: {}", e);
                None
            }
        }
    }

    /// True only for a correctly signed, unexpired token of the expected kind
    pub fn validate(&self, token: &str, expected: TokenKind) -> bool {
        self.validate_at(token, expected, chrono::Utc::now().timestamp())
    }

    fn validate_at(&self, token: &str, expected: TokenKind, now: i64) -> bool {
        match self.parse(token) {
            Some(claims) => !claims.is_expired_at(now, self.leeway) && claims.token_type == expected,
            None => false,
        }
    }

    /// Subject of a correctly signed token, `None` if parsing fails or the
    /// subject is not a UUID
    pub fn subject_of(&self, token: &str) -> Option<Uuid> {
        self.parse(token).and_then(|claims| claims.user_id())
    }

    /// Deterministic SHA-256 digest (lowercase hex) used as the refresh token
    /// lookup key. Normalised like `parse`, so a prefixed token hashes the same.
    pub fn digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bare(token).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Token text without a leading `Bearer ` or surrounding whitespace
fn bare(token: &str) -> &str {
    token.strip_prefix("Bearer ").unwrap_or(token).trim()
}
