use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::post,
};
use be_rate_limit::rate_limit_middleware;
use be_remote_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

mod analytics;
pub mod config;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod service;
pub mod store;
pub mod subscription;
pub mod types;
pub mod verifier;
pub mod webhook;

#[cfg(test)]
mod test_support;

use service::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let verify_route = Router::new()
        .route(
            "/verify-session-and-status",
            post(handlers::verify_session_and_status),
        )
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let routes = Router::new()
        .route("/stripe-webhook", post(handlers::stripe_webhook))
        .route("/check-subscription", post(handlers::check_subscription))
        .route("/cancel-subscription", post(handlers::cancel_subscription));

    verify_route
        .merge(routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

pub fn init_payment_service(db: Arc<DatabaseManager>) -> Result<Router> {
    debug!("Initializing payment service");

    let state = Arc::new(AppState::from_env(db).context("Failed to create payment service state")?);

    Ok(create_router(state))
}

pub use config::PaymentConfig;
pub use error::PaymentError;
pub use provider::{PaymentProvider, StripeProvider};
pub use store::PaymentStore;
pub use types::{
    CancelSubscriptionResponse, SessionData, SubscriptionStatusResponse, VerifyRequest,
    VerifyResponse,
};
