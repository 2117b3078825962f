use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;

const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";

/// Builds the 429 answer for a request whose window resets at `reset_at`.
pub fn too_many_requests(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Response {
    let retry_after = (reset_at - now).num_seconds().max(1);

    let body = Json(json!({
        "error": "Too many requests. Please try again later.",
        "retry_after": retry_after,
    }));

    let headers = [
        (header::RETRY_AFTER, HeaderValue::from(retry_after)),
        (RATE_LIMIT_REMAINING, HeaderValue::from(0)),
        (RATE_LIMIT_RESET, HeaderValue::from(reset_at.timestamp())),
        (
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ),
    ];

    (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response()
}
