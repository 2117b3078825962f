use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::warn;

use crate::client_ip::client_id_from_headers;
use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::response::too_many_requests;

/// Axum middleware enforcing the limiter's configured quota per client address.
///
/// Indeterminate checks are let through.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client_id = client_id_from_headers(req.headers());

    match limiter.check(&client_id).await {
        RateLimitDecision::Denied { reset_at } => {
            warn!(client_id = %client_id, path = %req.uri().path(), "Rate limit exceeded");
            too_many_requests(reset_at, Utc::now())
        }
        RateLimitDecision::Allowed { .. } | RateLimitDecision::Indeterminate { .. } => {
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use tower::ServiceExt;

    use super::*;
    use crate::limiter::RateLimitConfig;
    use crate::store::InMemoryRateLimitStore;

    fn app(limiter: RateLimiter) -> Router {
        let limiter = Arc::new(limiter);
        Router::new()
            .route("/guarded", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ))
    }

    fn request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/guarded")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_once_quota_is_spent() {
        let config = RateLimitConfig {
            max_requests: 2,
            ..Default::default()
        };
        let app = app(RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            config,
        ));

        for _ in 0..2 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn unconfigured_limiter_lets_requests_through() {
        let config = RateLimitConfig {
            max_requests: 0,
            ..Default::default()
        };
        let app = app(RateLimiter::unconfigured(config));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
