/// JWT Claims structure
///
/// Payload of every bearer token the service signs. Access and refresh
/// tokens share the shape and are told apart by `token_type`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token kind, carried in the `token_type` claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub token_type: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Unique token id; keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Create claims for `user_id` issued at `issued_at` and living `lifetime_seconds`
    pub fn new(
        user_id: Uuid,
        token_type: TokenKind,
        issued_at: i64,
        lifetime_seconds: i64,
        issuer: String,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            token_type,
            iat: issued_at,
            exp: issued_at + lifetime_seconds,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Subject as a user ID, `None` if it is not a well-formed UUID
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// Check expiry against `now`, allowing `leeway` seconds of skew
    pub fn is_expired_at(&self, now: i64, leeway: u64) -> bool {
        let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
        now >= self.exp.saturating_add(leeway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenKind::Access, 1_000, 900, "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp, 1_900);
        assert!(!claims.is_expired_at(1_899, 0));
        assert!(claims.is_expired_at(1_900, 0));
    }

    #[test]
    fn test_leeway_extends_expiry() {
        let claims = Claims::new(Uuid::new_v4(), TokenKind::Refresh, 0, 10, "test".to_string());
        assert!(!claims.is_expired_at(12, 5));
        assert!(claims.is_expired_at(15, 5));
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenKind::Access, 0, 60, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert!(claims.user_id().is_none());
    }

    #[test]
    fn test_token_ids_are_unique() {
        let user_id = Uuid::new_v4();
        let a = Claims::new(user_id, TokenKind::Refresh, 0, 60, "test".to_string());
        let b = Claims::new(user_id, TokenKind::Refresh, 0, 60, "test".to_string());
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TokenKind::Refresh).unwrap();
        assert_eq!(json, "\"refresh\"");
    }
}
