use std::sync::Arc;

use be_rate_limit::{RateLimitConfig, RateLimitStore, RateLimiter};
use be_remote_db::DatabaseManager;
use tracing::warn;

use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::provider::{PaymentProvider, StripeProvider};
use crate::store::PaymentStore;

pub struct AppState {
    pub config: PaymentConfig,
    pub provider: Arc<dyn PaymentProvider>,
    pub store: Arc<dyn PaymentStore>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: PaymentConfig,
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn PaymentStore>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            rate_limiter,
        }
    }

    pub fn from_env(db: Arc<DatabaseManager>) -> Result<Self, PaymentError> {
        let config = PaymentConfig::from_env();
        let missing = config.missing();
        if !missing.is_empty() {
            warn!(?missing, "Payment service is missing configuration");
        }

        // Endpoints refuse to reach the provider while the key is absent.
        let provider = StripeProvider::new(config.stripe_secret_key.as_deref().unwrap_or_default())?;

        let limiter_store: Arc<dyn RateLimitStore> = db.clone();
        let rate_limiter = RateLimiter::new(limiter_store, RateLimitConfig::from_env());

        Ok(Self::new(
            config,
            Arc::new(provider),
            db,
            Arc::new(rate_limiter),
        ))
    }
}
