//! Fixed-window rate limiting backed by Redis counters.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW_SECONDS,
};

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from(self.retry_after));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// A named bucket: `limit` requests per `window` seconds
struct Window {
    scope: &'static str,
    limit: u64,
    window: u64,
}

const GENERAL: Window = Window {
    scope: "general",
    limit: RATE_LIMIT_REQUESTS,
    window: RATE_LIMIT_WINDOW_SECONDS,
};

const AUTH: Window = Window {
    scope: "auth",
    limit: RATE_LIMIT_AUTH_REQUESTS,
    window: RATE_LIMIT_AUTH_WINDOW_SECONDS,
};

fn header_ip(request: &Request) -> Option<String> {
    let headers = request.headers();
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|chain| chain.split(',').next());
    let real_ip = headers.get("X-Real-IP").and_then(|h| h.to_str().ok());

    forwarded
        .or(real_ip)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Client key for the limiter.
///
/// Proxy headers are client-controlled, so they are read only when
/// `trust_proxy` is set; otherwise the socket peer address is used.
fn get_client_identifier(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = header_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(
    state: AppState,
    bucket: Window,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = get_client_identifier(&request, state.config.trust_proxy_headers);
    let key = format!("{}:{}", bucket.scope, client_id);

    let (count, allowed) = match state
        .cache
        .check_rate_limit(&key, bucket.limit, bucket.window)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            // Fail closed while Redis is unavailable
            tracing::error!(error = %e, scope = bucket.scope, "Rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: bucket.window,
            });
        }
    };

    if !allowed {
        tracing::warn!(client = %client_id, scope = bucket.scope, count, "Rate limit exceeded");
        return Err(RateLimitError {
            retry_after: bucket.window,
        });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(bucket.limit));
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(bucket.limit.saturating_sub(count)),
    );

    Ok(response)
}

/// General limit for every API route.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(state, GENERAL, request, next).await
}

/// Stricter limit for `/auth` (login and registration).
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(state, AUTH, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_rate_limit_error_response() {
        let error = RateLimitError { retry_after: 60 };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "60");
    }

    #[test]
    fn test_spoofed_headers_ignored_without_trusted_proxy() {
        let request = request_from(
            "192.0.2.10:5000",
            &[("X-Forwarded-For", "203.0.113.7"), ("X-Real-IP", "198.51.100.2")],
        );
        assert_eq!(get_client_identifier(&request, false), "192.0.2.10");
    }

    #[test]
    fn test_trusted_proxy_headers() {
        let request = request_from(
            "10.0.0.1:5000",
            &[("X-Forwarded-For", "203.0.113.7, 10.0.0.1")],
        );
        assert_eq!(get_client_identifier(&request, true), "203.0.113.7");

        let request = request_from("10.0.0.1:5000", &[("X-Real-IP", "198.51.100.2")]);
        assert_eq!(get_client_identifier(&request, true), "198.51.100.2");

        let request = request_from("10.0.0.1:5000", &[]);
        assert_eq!(get_client_identifier(&request, true), "10.0.0.1");
    }

    #[test]
    fn test_unknown_client() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(get_client_identifier(&request, false), "unknown");
    }
}
