use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

use crate::auth::AuthenticatedUser;

/// Request logger.
///
/// Logs method, path, status and latency of every request, and whether the
/// token filter attached an identity. Must be registered outside
/// `JwtMiddleware` so the identity is visible once the inner service returns.
/// Query strings and headers are never logged since they may carry tokens.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            let elapsed = start_time.elapsed();
            let status = res.status();
            let caller = res
                .request()
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|user| user.0.to_string())
                .unwrap_or_else(|| "anonymous".to_string());

            if status.is_server_error() {
                warn!(
                    "{} {} -> {} ({}ms, caller {})",
                    method,
                    path,
                    status.as_u16(),
                    elapsed.as_millis(),
                    caller
                );
            } else {
                info!(
                    "{} {} -> {} ({}ms, caller {})",
                    method,
                    path,
                    status.as_u16(),
                    elapsed.as_millis(),
                    caller
                );
            }

            Ok(res)
        })
    }
}
