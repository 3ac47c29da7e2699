//! Per-client rate limiting on top of the in-memory `RateLimiter`.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::infra::RateLimiter;

/// 429 response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from(self.retry_after));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        let body = serde_json::json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "Too many requests. Please try again later.",
            }
        });

        (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
    }
}

/// Client identifier: first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the socket address.
pub fn client_identifier(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("X-Forwarded-For")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(real_ip) = header("X-Real-IP") {
        return real_ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

async fn limit(
    limiter: &RateLimiter,
    tier: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = client_identifier(&request);
    let decision = limiter.check(&format!("{}:{}", tier, client_id));

    if !decision.allowed {
        tracing::warn!(
            client = %client_id,
            tier,
            count = decision.count,
            "Rate limit exceeded"
        );
        return Err(RateLimitError {
            retry_after: decision.retry_after,
        });
    }

    let mut response = next.run(request).await;

    let remaining = limiter.max_requests().saturating_sub(decision.count);
    response
        .headers_mut()
        .insert("X-RateLimit-Limit", HeaderValue::from(limiter.max_requests()));
    response
        .headers_mut()
        .insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}

/// General API tier.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    limit(&state.rate_limits.general, "general", request, next).await
}

/// Stricter tier for authentication endpoints.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    limit(&state.rate_limits.auth, "auth", request, next).await
}
