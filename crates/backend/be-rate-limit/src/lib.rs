//! Per-client fixed-window rate limiting backed by a persisted counter row.
//!
//! The limiter never blocks a request because of its own failures: store or
//! configuration problems produce [`RateLimitDecision::Indeterminate`], which
//! the middleware lets through.

mod client_ip;
mod limiter;
mod middleware;
mod response;
mod store;

pub use client_ip::{UNKNOWN_CLIENT, client_id_from_headers};
pub use limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use middleware::rate_limit_middleware;
pub use response::too_many_requests;
pub use store::RateLimitStore;

#[cfg(any(test, feature = "test-support"))]
pub use store::InMemoryRateLimitStore;
