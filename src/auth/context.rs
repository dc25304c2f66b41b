/// Request-scoped caller identity
///
/// `JwtMiddleware` stores an `AuthenticatedUser` in the request extensions;
/// handlers read it back through the `AuthContext` extractor. Nothing here is
/// shared between requests.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Identity attached by the inbound token filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext {
    user_id: Option<Uuid>,
}

impl AuthContext {
    pub fn of(req: &HttpRequest) -> Self {
        Self {
            user_id: req.extensions().get::<AuthenticatedUser>().map(|user| user.0),
        }
    }

    /// The authenticated caller; fails closed with 401 when nobody is attached
    pub fn current_user_id(&self) -> Result<Uuid, AppError> {
        self.user_id.ok_or(AppError::Auth(AuthError::Unauthenticated))
    }
}

impl FromRequest for AuthContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(AuthContext::of(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_missing_identity_fails_closed() {
        let req = TestRequest::default().to_http_request();
        let ctx = AuthContext::of(&req);

        assert!(matches!(
            ctx.current_user_id(),
            Err(AppError::Auth(AuthError::Unauthenticated))
        ));
    }

    #[test]
    fn test_attached_identity_is_returned() {
        let user_id = Uuid::new_v4();
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(AuthenticatedUser(user_id));

        let ctx = AuthContext::of(&req);
        assert_eq!(ctx.current_user_id().unwrap(), user_id);
    }
}
