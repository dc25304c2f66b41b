/// JWT Authentication Middleware
///
/// Runs once per request. A valid access token in the Authorization header
/// attaches an `AuthenticatedUser` to the request extensions; anything else
/// leaves the request anonymous. The request is always forwarded: protected
/// handlers reject anonymous callers themselves through `AuthContext`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{AuthenticatedUser, TokenCodec, TokenKind};

pub struct JwtMiddleware {
    codec: Arc<TokenCodec>,
}

impl JwtMiddleware {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    codec: Arc<TokenCodec>,
}

/// Extract the credential of an `Authorization: Bearer <token>` header
fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = match bearer_token(&req) {
            Some(token) if self.codec.validate(token, TokenKind::Access) => {
                self.codec.subject_of(token)
            }
            Some(_) => {
                tracing::debug!(path = %req.path(), "Bearer token rejected");
                None
            }
            None => None,
        };

        if let Some(user_id) = identity {
            req.extensions_mut().insert(AuthenticatedUser(user_id));
            tracing::debug!(user_id = %user_id, "Access token accepted");
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};
    use uuid::Uuid;

    use crate::auth::AuthContext;
    use crate::configuration::JwtSettings;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
            leeway: 0,
        }))
    }

    async fn whoami(ctx: AuthContext) -> HttpResponse {
        match ctx.current_user_id() {
            Ok(id) => HttpResponse::Ok().body(id.to_string()),
            Err(_) => HttpResponse::Ok().body("anonymous"),
        }
    }

    #[actix_web::test]
    async fn test_identity_attached_for_access_token() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let token = codec.issue(user_id, TokenKind::Access).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(JwtMiddleware::new(codec.clone()))
                .route("/", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn test_request_forwarded_without_identity() {
        let codec = codec();
        let refresh = codec.issue(Uuid::new_v4(), TokenKind::Refresh).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(JwtMiddleware::new(codec.clone()))
                .route("/", web::get().to(whoami)),
        )
        .await;

        let headers = vec![
            None,
            Some("Bearer not.a.jwt".to_string()),
            Some(format!("Bearer {}", refresh)),
            Some(format!("Basic {}", refresh)),
            Some("Bearer ".to_string()),
        ];

        for header in headers {
            let mut req = test::TestRequest::get().uri("/");
            if let Some(value) = &header {
                req = req.insert_header((AUTHORIZATION, value.clone()));
            }
            let resp = test::call_service(&app, req.to_request()).await;
            assert!(resp.status().is_success(), "request was not forwarded: {:?}", header);
            let body = test::read_body(resp).await;
            assert_eq!(body, "anonymous".as_bytes(), "identity leaked for {:?}", header);
        }
    }
}
