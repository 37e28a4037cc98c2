use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError, HttpMessage, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use atelier_models::auth::AuthContext;

use crate::errors::PortalError;
use crate::services::tokens::TokenService;

/// Bearer-token gate for the portal's protected scopes. Routes that should
/// stay public are simply not wrapped; everything behind this middleware
/// gets an `AuthContext` in its request extensions.
#[derive(Clone)]
pub struct AuthMiddlewareFactory {
    tokens: Arc<TokenService>,
}

impl AuthMiddlewareFactory {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddleware {
            service: Rc::new(service),
            tokens: Arc::clone(&self.tokens),
        }))
    }
}

pub struct AuthMiddleware<S> {
    service: Rc<S>,
    tokens: Arc<TokenService>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let tokens = Arc::clone(&self.tokens);

        Box::pin(async move {
            let bearer = req
                .headers()
                .get("Authorization")
                .and_then(|header| header.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_owned);

            let token = match bearer {
                Some(token) => token,
                None => {
                    let response = PortalError::InvalidSignature.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            match tokens.verify(&token) {
                Ok(user_id) => {
                    req.extensions_mut().insert(AuthContext { user_id });
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    tracing::warn!("Bearer token rejected: {}", err);
                    Ok(req.into_response(err.error_response()).map_into_right_body())
                }
            }
        })
    }
}

pub fn extract_auth_context(req: &actix_web::HttpRequest) -> Option<AuthContext> {
    req.extensions().get::<AuthContext>().copied()
}

/// The authenticated user id, which the middleware is guaranteed to have
/// inserted on any route inside a protected scope.
pub fn extract_user_id(req: &actix_web::HttpRequest) -> Result<Uuid, PortalError> {
    extract_auth_context(req)
        .map(|ctx| ctx.user_id)
        .ok_or(PortalError::InvalidSignature)
}
