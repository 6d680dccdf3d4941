//! HTTP plumbing shared by the survey routers: JSON error bodies, the admin
//! API-key guard, and the per-client rate limiter.

pub mod api_key;
pub mod rate_limit;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub use api_key::{require_api_key, AdminKeys};
pub use rate_limit::{rate_limit, RateLimitConfig, RateLimitExceeded, RateLimiter};

/// `{error, message}` body used by every failure response.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": code,
        "message": message.into(),
    });
    (status, Json(payload)).into_response()
}

/// Peer address when the server was started with connect info, otherwise the
/// first `X-Forwarded-For` entry, otherwise the unspecified address.
pub fn client_ip(request: &Request) -> IpAddr {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn client_ip_prefers_connect_info() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "10.0.0.9")
            .body(Body::empty())
            .expect("request builds");
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 5000))));

        assert_eq!(client_ip(&request), IpAddr::from([192, 168, 1, 4]));
    }

    #[test]
    fn client_ip_falls_back_to_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.9, 172.16.0.1")
            .body(Body::empty())
            .expect("request builds");

        assert_eq!(client_ip(&request), IpAddr::from([10, 0, 0, 9]));
    }
}
