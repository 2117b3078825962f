use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provider-neutral views of Stripe objects
// ---------------------------------------------------------------------------

/// The parts of a checkout session that reconciliation reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutSnapshot {
    pub id: String,
    pub mode: String,
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub customer_email: Option<String>,
    /// Minor currency units, as reported by the provider.
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub id: String,
    pub event_type: String,
    pub kind: ProviderEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEventKind {
    CheckoutCompleted {
        session_id: String,
        metadata: HashMap<String, String>,
    },
    Other,
}

// ---------------------------------------------------------------------------
// POST /verify-session-and-status
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub session_id: Option<String>,
    pub pending_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyResponse {
    pub has_paid: bool,
    pub reason: String,
    pub session_data: SessionData,
}

/// Redacted projection of the checkout session returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionData {
    pub mode: String,
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub customer_email: Option<String>,
    /// Major currency units.
    pub amount_total: Option<f64>,
    pub currency: Option<String>,
}

impl From<&CheckoutSnapshot> for SessionData {
    fn from(snapshot: &CheckoutSnapshot) -> Self {
        Self {
            mode: snapshot.mode.clone(),
            payment_status: snapshot.payment_status.clone(),
            status: snapshot.status.clone(),
            customer_email: snapshot.customer_email.clone(),
            amount_total: snapshot.amount_total.map(|amount| amount as f64 / 100.0),
            currency: snapshot.currency.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /check-subscription, POST /cancel-subscription
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub is_subscribed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
