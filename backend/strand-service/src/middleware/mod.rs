/// HTTP middleware utilities for strand-service
///
/// Sign-in is handled upstream; the gateway forwards the authenticated user
/// in the `x-user-id` header. `IdentityHeader` lifts it into request
/// extensions and `UserId` extracts it from there, so routes that take a
/// `UserId` must be wrapped by `IdentityHeader`.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user identifier stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

fn user_id_from_header(req: &HttpRequest) -> Option<UserId> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(UserId)
}

// =====================================================================
// Identity header
// =====================================================================

/// Copies a valid `x-user-id` into request extensions. Requests without one
/// pass through untouched; handlers that need a user reject them.
pub struct IdentityHeader;

impl<S, B> Transform<S, ServiceRequest> for IdentityHeader
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityHeaderService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityHeaderService {
            service: Rc::new(service),
        }))
    }
}

pub struct IdentityHeaderService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityHeaderService<S>
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
        if let Some(user_id) = user_id_from_header(req.request()) {
            req.extensions_mut().insert(user_id);
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserId>()
                .copied()
                .ok_or_else(|| ErrorUnauthorized("User ID missing")),
        )
    }
}

// =====================================================================
// Request timing
// =====================================================================

pub struct RequestTimer;

impl<S, B> Transform<S, ServiceRequest> for RequestTimer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTimerService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTimerService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestTimerService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestTimerService<S>
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
        let service = self.service.clone();
        let path = req.path().to_string();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed_ms = start.elapsed().as_millis();
            match &res {
                Ok(response) => {
                    let status = response.status().as_u16();
                    tracing::debug!(%method, %path, status, elapsed_ms, "request completed");
                }
                Err(err) => {
                    tracing::debug!(%method, %path, elapsed_ms, error = %err, "request failed");
                }
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};

    async fn whoami(user_id: UserId) -> HttpResponse {
        HttpResponse::Ok().body(user_id.0.to_string())
    }

    #[actix_web::test]
    async fn test_user_id_read_from_header() {
        let app = test::init_service(
            App::new()
                .wrap(IdentityHeader)
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let id = Uuid::new_v4();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, id.to_string());
    }

    #[actix_web::test]
    async fn test_malformed_user_id_rejected() {
        let app = test::init_service(
            App::new()
                .wrap(IdentityHeader)
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_header_ignored_without_middleware() {
        let req = test::TestRequest::default()
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .to_http_request();

        assert!(UserId::extract(&req).await.is_err());
    }
}
