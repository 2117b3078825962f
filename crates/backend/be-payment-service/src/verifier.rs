use std::sync::LazyLock;

use be_remote_db::{ActivePlan, PaidSessionUpdate, PlanGrant, PlanType};
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::service::AppState;
use crate::store::record_failure;
use crate::types::{CheckoutSnapshot, SessionData, VerifyRequest, VerifyResponse};

pub const CHECKOUT_SESSION_PREFIX: &str = "cs_";

/// Renewal horizon granted by a completed subscription checkout.
pub const YEARLY_PLAN_DURATION: TimeDelta = TimeDelta::days(365);

static CANONICAL_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("canonical uuid pattern compiles")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_paid: bool,
    pub reason: String,
    pub plan_type: Option<PlanType>,
}

/// Decides whether a checkout session is complete for its mode.
pub fn classify(snapshot: &CheckoutSnapshot) -> Classification {
    match snapshot.mode.as_str() {
        "payment" => {
            let status = snapshot.payment_status.as_deref().unwrap_or("unknown");
            Classification {
                is_paid: status == "paid",
                reason: format!("Payment mode: payment_status is {status}"),
                plan_type: Some(PlanType::OneTime),
            }
        }
        "subscription" => {
            let status = snapshot.status.as_deref().unwrap_or("unknown");
            Classification {
                is_paid: status == "complete",
                reason: format!("Subscription mode: session status is {status}"),
                plan_type: Some(PlanType::Yearly),
            }
        }
        other => Classification {
            is_paid: false,
            reason: format!("Unsupported checkout mode: {other}"),
            plan_type: None,
        },
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, PaymentError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(PaymentError::MissingField(field))
}

/// Checks the request shape. Runs before any provider call.
pub fn validate(req: &VerifyRequest) -> Result<(String, Uuid), PaymentError> {
    let session_id = required(&req.session_id, "session_id")?;
    let pending_session_id = required(&req.pending_session_id, "pending_session_id")?;

    if !session_id.starts_with(CHECKOUT_SESSION_PREFIX) {
        return Err(PaymentError::InvalidField {
            field: "session_id",
            reason: "expected a checkout session id starting with cs_",
        });
    }

    let invalid_uuid = PaymentError::InvalidField {
        field: "pending_session_id",
        reason: "expected a UUID",
    };
    if !CANONICAL_UUID.is_match(pending_session_id) {
        return Err(invalid_uuid);
    }
    let pending_session_id = Uuid::parse_str(pending_session_id).map_err(|_| invalid_uuid)?;

    Ok((session_id.to_string(), pending_session_id))
}

/// Verifies a checkout session with the provider and reconciles local state.
///
/// Repeating the call for the same session converges on the same rows.
pub async fn verify_session(
    state: &AppState,
    req: &VerifyRequest,
    now: DateTime<Utc>,
) -> Result<VerifyResponse, PaymentError> {
    state.config.require_stripe_secret_key()?;
    let (session_id, pending_session_id) = validate(req)?;

    let snapshot = state.provider.retrieve_checkout_session(&session_id).await?;
    let classification = classify(&snapshot);

    if classification.is_paid {
        mark_paid(state, pending_session_id, &snapshot, &classification, now).await?;

        if let Some(email) = snapshot.customer_email.as_deref() {
            let plan = (classification.plan_type == Some(PlanType::Yearly)).then(|| PlanGrant {
                active_plan: ActivePlan::Yearly,
                plan_renewal_at: Some(now + YEARLY_PLAN_DURATION),
            });
            if let Err(e) = state.store.upsert_user_email(email, now, plan).await {
                return Err(record_failure(
                    state.store.as_ref(),
                    "upsert_user_email",
                    e,
                    serde_json::json!({ "session_id": session_id }),
                )
                .await);
            }
        }

        info!(
            session_id = %session_id,
            pending_session_id = %pending_session_id,
            plan_type = ?classification.plan_type,
            "Checkout session reconciled"
        );
    }

    Ok(VerifyResponse {
        has_paid: classification.is_paid,
        reason: classification.reason,
        session_data: SessionData::from(&snapshot),
    })
}

async fn mark_paid(
    state: &AppState,
    pending_session_id: Uuid,
    snapshot: &CheckoutSnapshot,
    classification: &Classification,
    now: DateTime<Utc>,
) -> Result<(), PaymentError> {
    let update = PaidSessionUpdate {
        paid_at: now,
        customer_email: snapshot.customer_email.clone(),
        plan_type: classification.plan_type,
    };

    let result = match state
        .store
        .mark_pending_session_paid(pending_session_id, &update)
        .await
    {
        Err(e) if e.is_undefined_column() && update.plan_type.is_some() => {
            warn!(error = %e, "pending_sessions lacks plan_type; retrying without it");
            state
                .store
                .mark_pending_session_paid(pending_session_id, &update.without_optional_columns())
                .await
        }
        other => other,
    };

    match result {
        Ok(0) => {
            // Payment is confirmed; the entitlement upsert still runs.
            warn!(
                pending_session_id = %pending_session_id,
                session_id = %snapshot.id,
                "No pending session matched the paid checkout"
            );
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => Err(record_failure(
            state.store.as_ref(),
            "mark_pending_session_paid",
            e,
            serde_json::json!({
                "pending_session_id": pending_session_id,
                "session_id": snapshot.id,
            }),
        )
        .await),
    }
}
