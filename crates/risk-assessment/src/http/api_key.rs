use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::error_response;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Static set of admin keys taken from configuration. An empty set rejects everything.
#[derive(Debug, Clone, Default)]
pub struct AdminKeys {
    keys: Arc<Vec<String>>,
}

impl AdminKeys {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|key: String| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        Self {
            keys: Arc::new(keys),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn verify(&self, candidate: &str) -> bool {
        // every key is compared so timing does not reveal which one matched
        self.keys
            .iter()
            .fold(false, |matched, key| {
                constant_time_eq(key.as_bytes(), candidate.as_bytes()) | matched
            })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub async fn require_api_key(
    State(keys): State<AdminKeys>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if presented.is_empty() || !keys.verify(presented) {
        warn!(path = %request.uri().path(), "admin request rejected");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid API key",
        );
    }

    next.run(request).await
}
