use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::config::AuthSettings;
use crate::models::Role;
use crate::services::auth_service;
use crate::utils::AppError;

/// Bearer-token guard for a route scope.
///
/// Missing token is 403, an invalid or expired one 401, and a valid token whose
/// role is not in `roles` 403. On success the verified `Claims` are inserted into
/// the request extensions for `web::ReqData<Claims>`.
#[derive(Clone)]
pub struct AuthMiddleware {
    roles: Rc<Vec<Role>>,
}

impl AuthMiddleware {
    pub fn allow(roles: &[Role]) -> Self {
        AuthMiddleware {
            roles: Rc::new(roles.to_vec()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            roles: self.roles.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    roles: Rc<Vec<Role>>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(settings) = req.app_data::<web::Data<AuthSettings>>().cloned() else {
            return Box::pin(async move {
                Err(AppError::Internal("Auth settings are not configured".to_string()).into())
            });
        };

        let Some(token) = bearer_token(&req) else {
            log::warn!("🔒 {} {} - missing token", req.method(), req.path());
            return Box::pin(async move { Err(AppError::forbidden("Missing authorization token").into()) });
        };

        let claims = match auth_service::verify_token(&token, &settings) {
            Ok(claims) => claims,
            Err(e) => {
                log::warn!("🔒 {} {} - {}", req.method(), req.path(), e);
                return Box::pin(async move { Err(e.into()) });
            }
        };

        if !self.roles.contains(&claims.user_role) {
            log::warn!(
                "🔒 {} {} - role '{}' not allowed",
                req.method(),
                req.path(),
                claims.user_role
            );
            return Box::pin(async move {
                Err(AppError::forbidden("You do not have permission to access this resource").into())
            });
        }

        req.extensions_mut().insert(claims);

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}
