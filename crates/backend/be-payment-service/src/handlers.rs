use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use be_remote_db::PerformanceLogEntry;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::analytics;
use crate::error::{PaymentError, VerifyError};
use crate::service::AppState;
use crate::subscription::{self, EmailInputs, STATUS_EMAIL_SOURCES};
use crate::types::{
    CancelSubscriptionRequest, CancelSubscriptionResponse, SubscriptionStatusResponse,
    VerifyRequest, VerifyResponse, WebhookAck,
};
use crate::verifier;
use crate::webhook::{self, WebhookOutcome};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Decodes an optional JSON body. An empty body yields the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PaymentError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| PaymentError::InvalidField {
        field: "body",
        reason: "expected a JSON object",
    })
}

// ---------------------------------------------------------------------------
// POST /verify-session-and-status
// ---------------------------------------------------------------------------

/// Confirms a checkout with the provider and records the purchase.
pub async fn verify_session_and_status(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<VerifyResponse>, VerifyError> {
    let started = Instant::now();

    let result = match parse_body::<VerifyRequest>(&body) {
        Ok(req) => verifier::verify_session(&state, &req, Utc::now()).await,
        Err(e) => Err(e),
    };

    let entry = PerformanceLogEntry {
        function_name: "verify_session_and_status".to_string(),
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
        success: result.is_ok(),
    };
    if let Err(e) = state.store.log_performance(&entry).await {
        warn!(error = %e, "Failed to write performance log");
    }

    match &result {
        Ok(response) => {
            analytics::track_session_verified(response.has_paid, &response.session_data.mode)
        }
        Err(e) => analytics::track_session_verification_failed(e.kind()),
    }

    result.map(Json).map_err(VerifyError)
}

// ---------------------------------------------------------------------------
// POST /stripe-webhook
// ---------------------------------------------------------------------------

/// Receives signed provider events. The body must stay unparsed for signature checks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, PaymentError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match webhook::process_event(&state, &body, signature).await? {
        WebhookOutcome::ItineraryCreated { .. } => analytics::track_webhook_itinerary_created(),
        WebhookOutcome::Duplicate => analytics::track_webhook_duplicate(),
        WebhookOutcome::MetadataSkipped { .. } | WebhookOutcome::Ignored { .. } => {}
    }

    Ok(Json(WebhookAck { received: true }))
}

// ---------------------------------------------------------------------------
// POST /check-subscription
// ---------------------------------------------------------------------------

pub async fn check_subscription(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<SubscriptionStatusResponse>, PaymentError> {
    // A body that is not JSON is treated as absent so header and query lookups still apply.
    let body: Option<serde_json::Value> = serde_json::from_slice(&body).ok();
    let inputs = EmailInputs {
        body: body.as_ref(),
        headers: &headers,
        query: &query,
    };

    let (email, _source) = subscription::resolve_email(&STATUS_EMAIL_SOURCES, &inputs)
        .ok_or(PaymentError::MissingField("email"))?;

    let is_subscribed = subscription::check_subscription(&state, &email, Utc::now()).await?;
    analytics::track_subscription_checked(is_subscribed);

    Ok(Json(SubscriptionStatusResponse { is_subscribed }))
}

// ---------------------------------------------------------------------------
// POST /cancel-subscription
// ---------------------------------------------------------------------------

pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, PaymentError> {
    let req: CancelSubscriptionRequest = parse_body(&body)?;
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(PaymentError::MissingField("email"))?;

    let outcome = match subscription::cancel_subscription(&state, email).await {
        Ok(outcome) => outcome,
        Err(e) => {
            analytics::track_subscription_cancel_failed(e.kind());
            return Err(e);
        }
    };

    let status = if outcome.cancelled_any() {
        if let subscription::CancelOutcome::Cancelled { count } = outcome {
            analytics::track_subscription_cancelled(count);
        }
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    Ok((
        status,
        Json(CancelSubscriptionResponse {
            success: outcome.cancelled_any(),
            message: outcome.message(),
        }),
    )
        .into_response())
}
