/// Authentication module
///
/// Password hashing, JWT issuance and validation, refresh token storage and
/// rotation, and the request-scoped caller identity.

mod claims;
mod context;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::{Claims, TokenKind};
pub use context::{AuthContext, AuthenticatedUser};
pub use jwt::TokenCodec;
pub use password::{validate_password, HashEncoder};
pub use refresh_token::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore};
pub use service::{AuthService, TokenPair};
