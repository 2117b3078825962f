use async_trait::async_trait;
use stripe::{ClientBuilder, RequestStrategy};
use stripe_billing::subscription::{CancelSubscription, ListSubscription, ListSubscriptionStatus};
use stripe_checkout::checkout_session::RetrieveCheckoutSession;
use stripe_core::customer::ListCustomer;
use stripe_shared::{CheckoutSessionId, SubscriptionId};
use stripe_webhook::{EventObject, Webhook};
use tracing::{debug, warn};

use crate::error::PaymentError;
use crate::types::{CheckoutSnapshot, ProviderEvent, ProviderEventKind};

/// Everything the reconciliation flow asks of the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSnapshot, PaymentError>;

    /// Id of the first provider customer registered under `email`.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, PaymentError>;

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<String>, PaymentError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError>;

    /// Verifies `signature` over the raw `payload` and decodes the event.
    fn construct_event(
        &self,
        payload: &str,
        signature: &str,
        secret: &str,
    ) -> Result<ProviderEvent, PaymentError>;
}

pub struct StripeProvider {
    client: stripe::Client,
}

impl StripeProvider {
    pub fn new(secret_key: &str) -> Result<Self, PaymentError> {
        let client = ClientBuilder::new(secret_key)
            .request_strategy(RequestStrategy::Once)
            .build()
            .map_err(|e| PaymentError::Config(format!("Failed to build Stripe client: {e}")))?;
        Ok(Self { client })
    }
}

fn provider_error(err: stripe::StripeError) -> PaymentError {
    let message = match &err {
        stripe::StripeError::Stripe(api_error, _) => api_error
            .message
            .clone()
            .unwrap_or_else(|| "Payment processing error".to_string()),
        other => other.to_string(),
    };
    PaymentError::Provider(message)
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSnapshot, PaymentError> {
        let id: CheckoutSessionId = session_id.parse().map_err(|_| PaymentError::InvalidField {
            field: "session_id",
            reason: "not a checkout session id",
        })?;

        let session = RetrieveCheckoutSession::new(id)
            .send(&self.client)
            .await
            .map_err(provider_error)?;

        let customer_email = session
            .customer_details
            .as_ref()
            .and_then(|details| details.email.clone())
            .or_else(|| session.customer_email.clone());

        Ok(CheckoutSnapshot {
            id: session.id.to_string(),
            mode: session.mode.to_string(),
            payment_status: Some(session.payment_status.to_string()),
            status: session.status.map(|s| s.to_string()),
            customer_email,
            amount_total: session.amount_total,
            currency: session.currency.map(|c| c.to_string()),
        })
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, PaymentError> {
        let page = ListCustomer::new()
            .email(email)
            .limit(1)
            .send(&self.client)
            .await
            .map_err(provider_error)?;

        Ok(page.data.first().map(|customer| customer.id.to_string()))
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<String>, PaymentError> {
        let page = ListSubscription::new()
            .customer(customer_id)
            .status(ListSubscriptionStatus::Active)
            .send(&self.client)
            .await
            .map_err(provider_error)?;

        Ok(page.data.iter().map(|sub| sub.id.to_string()).collect())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let id: SubscriptionId = subscription_id
            .parse()
            .map_err(|_| PaymentError::Internal(anyhow::anyhow!("bad subscription id")))?;

        let cancelled = CancelSubscription::new(id)
            .send(&self.client)
            .await
            .map_err(provider_error)?;

        debug!(subscription_id = %cancelled.id, status = %cancelled.status, "Subscription cancelled");
        Ok(())
    }

    fn construct_event(
        &self,
        payload: &str,
        signature: &str,
        secret: &str,
    ) -> Result<ProviderEvent, PaymentError> {
        let event = Webhook::construct_event(payload, signature, secret).map_err(|e| {
            warn!(error = %e, "Rejected webhook payload");
            PaymentError::WebhookSignatureInvalid
        })?;

        let id = event.id.to_string();
        let event_type = event.type_.to_string();
        let kind = match event.data.object {
            EventObject::CheckoutSessionCompleted(session) => ProviderEventKind::CheckoutCompleted {
                session_id: session.id.to_string(),
                metadata: session.metadata.unwrap_or_default().into_iter().collect(),
            },
            _ => ProviderEventKind::Other,
        };

        Ok(ProviderEvent {
            id,
            event_type,
            kind,
        })
    }
}
