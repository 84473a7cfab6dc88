//! Rate limiting middleware.

use actix_web::{
    Error, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderMap, HeaderName, HeaderValue},
};
use quota_shared::RateLimitExceededResponse;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use quota_core::{Decision, RateLimiter};

use super::client::{api_token, client_ip};
use super::error::AppError;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_RATELIMIT_TYPE: HeaderName = HeaderName::from_static("x-ratelimit-type");

/// Headers describing `decision`, attached to allowed and rejected responses alike.
fn rate_limit_headers(decision: &Decision) -> [(HeaderName, HeaderValue); 4] {
    [
        (X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit)),
        (X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining)),
        (X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at.timestamp())),
        (
            X_RATELIMIT_TYPE,
            HeaderValue::from_static(decision.limit_kind.as_str()),
        ),
    ]
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    for (name, value) in rate_limit_headers(decision) {
        headers.insert(name, value);
    }
}

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
    api_key_header: HeaderName,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>, api_key_header: HeaderName) -> Self {
        Self {
            limiter,
            api_key_header,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            api_key_header: self.api_key_header.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    api_key_header: HeaderName,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        let ip = client_ip(req.request());
        let token = api_token(req.request(), &self.api_key_header);

        Box::pin(async move {
            let decision = match limiter.check_limit(&ip, token.as_deref()).await {
                Ok(decision) => decision,
                Err(e) => {
                    // Store outage: neither allow nor deny
                    let response = AppError::from(e).error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            if !decision.allowed {
                tracing::warn!(
                    ip = %ip,
                    limit_kind = %decision.limit_kind,
                    limit = decision.limit,
                    reset_at = decision.reset_at.timestamp(),
                    "Rate limit exceeded"
                );

                let mut response = HttpResponse::TooManyRequests();
                for header in rate_limit_headers(&decision) {
                    response.insert_header(header);
                }
                let response = response.json(RateLimitExceededResponse::default());

                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            apply_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}
