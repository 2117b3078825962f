use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use be_rate_limit::{InMemoryRateLimitStore, RateLimitConfig, RateLimiter};
use parking_lot::Mutex;

use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::provider::PaymentProvider;
use crate::service::AppState;
use crate::store::InMemoryPaymentStore;
use crate::types::{CheckoutSnapshot, ProviderEvent, ProviderEventKind};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const SIGNATURE: &str = "t=1,v1=valid";

/// Scripted provider. Signatures are valid only when equal to [`SIGNATURE`].
#[derive(Default)]
pub struct FakeProvider {
    pub sessions: Mutex<HashMap<String, CheckoutSnapshot>>,
    pub customers: Mutex<HashMap<String, String>>,
    pub subscriptions: Mutex<HashMap<String, Vec<String>>>,
    pub cancelled: Mutex<Vec<String>>,
    pub event: Mutex<Option<ProviderEvent>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_session(snapshot: CheckoutSnapshot) -> Self {
        let provider = Self::default();
        provider
            .sessions
            .lock()
            .insert(snapshot.id.clone(), snapshot);
        provider
    }

    pub fn with_customer(email: &str, customer_id: &str, subscriptions: &[&str]) -> Self {
        let provider = Self::default();
        provider
            .customers
            .lock()
            .insert(email.to_string(), customer_id.to_string());
        provider.subscriptions.lock().insert(
            customer_id.to_string(),
            subscriptions.iter().map(|s| s.to_string()).collect(),
        );
        provider
    }

    pub fn with_event(event: ProviderEvent) -> Self {
        let provider = Self::default();
        *provider.event.lock() = Some(event);
        provider
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSnapshot, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                PaymentError::Provider(format!("No such checkout.session: '{session_id}'"))
            })
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.customers.lock().get(email).cloned())
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<String>, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .subscriptions
            .lock()
            .get(customer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cancelled.lock().push(subscription_id.to_string());
        Ok(())
    }

    fn construct_event(
        &self,
        _payload: &str,
        signature: &str,
        secret: &str,
    ) -> Result<ProviderEvent, PaymentError> {
        if signature != SIGNATURE || secret != WEBHOOK_SECRET {
            return Err(PaymentError::WebhookSignatureInvalid);
        }
        Ok(self.event.lock().clone().unwrap_or(ProviderEvent {
            id: "evt_other".into(),
            event_type: "customer.created".into(),
            kind: ProviderEventKind::Other,
        }))
    }
}

pub fn test_config() -> PaymentConfig {
    PaymentConfig {
        stripe_secret_key: Some("sk_test_fake".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        public_base_url: Some("https://wayfare.test".into()),
    }
}

pub fn test_state(provider: Arc<FakeProvider>, store: Arc<InMemoryPaymentStore>) -> AppState {
    let limiter = RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        RateLimitConfig::default(),
    );
    AppState::new(test_config(), provider, store, Arc::new(limiter))
}

pub fn paid_one_time_session(id: &str) -> CheckoutSnapshot {
    CheckoutSnapshot {
        id: id.into(),
        mode: "payment".into(),
        payment_status: Some("paid".into()),
        status: Some("complete".into()),
        customer_email: Some("traveler@example.com".into()),
        amount_total: Some(1999),
        currency: Some("usd".into()),
    }
}

pub fn complete_subscription_session(id: &str) -> CheckoutSnapshot {
    CheckoutSnapshot {
        id: id.into(),
        mode: "subscription".into(),
        payment_status: Some("paid".into()),
        status: Some("complete".into()),
        customer_email: Some("member@example.com".into()),
        amount_total: Some(9900),
        currency: Some("usd".into()),
    }
}
