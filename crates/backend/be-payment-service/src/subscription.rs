use std::collections::HashMap;

use axum::http::HeaderMap;
use be_remote_db::ActivePlan;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PaymentError;
use crate::service::AppState;
use crate::store::record_failure;

/// The request parts an email may be read from.
pub struct EmailInputs<'a> {
    pub body: Option<&'a Value>,
    pub headers: &'a HeaderMap,
    pub query: &'a HashMap<String, String>,
}

/// A named place to look for the caller's email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSource {
    BodyField(&'static str),
    Header(&'static str),
    QueryParam(&'static str),
}

/// Lookup order for subscription status checks. The first non-empty value wins.
pub const STATUS_EMAIL_SOURCES: [EmailSource; 3] = [
    EmailSource::BodyField("email"),
    EmailSource::Header("x-admin-email"),
    EmailSource::QueryParam("email"),
];

impl EmailSource {
    pub fn name(&self) -> String {
        match self {
            EmailSource::BodyField(field) => format!("body.{field}"),
            EmailSource::Header(header) => format!("header {header}"),
            EmailSource::QueryParam(param) => format!("query ?{param}"),
        }
    }

    fn extract(&self, inputs: &EmailInputs<'_>) -> Option<String> {
        let raw = match self {
            EmailSource::BodyField(field) => inputs.body?.get(*field)?.as_str(),
            EmailSource::Header(header) => inputs.headers.get(*header)?.to_str().ok(),
            EmailSource::QueryParam(param) => inputs.query.get(*param).map(String::as_str),
        }?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Returns the first email found in `sources`, in order, with the source it came from.
pub fn resolve_email(
    sources: &[EmailSource],
    inputs: &EmailInputs<'_>,
) -> Option<(String, EmailSource)> {
    sources.iter().find_map(|source| {
        let email = source.extract(inputs)?;
        debug!(source = %source.name(), "Resolved caller email");
        Some((email, *source))
    })
}

/// Whether `email` holds a yearly plan that has not passed its renewal date.
pub async fn check_subscription(
    state: &AppState,
    email: &str,
    now: DateTime<Utc>,
) -> Result<bool, PaymentError> {
    match state.store.get_user_email(email).await {
        Ok(record) => Ok(record.is_some_and(|r| r.has_active_yearly_plan(now))),
        Err(e) => Err(record_failure(
            state.store.as_ref(),
            "get_user_email",
            e,
            serde_json::json!({ "operation": "check_subscription" }),
        )
        .await),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { count: usize },
    NoCustomer,
    NoActiveSubscriptions,
}

impl CancelOutcome {
    pub fn cancelled_any(&self) -> bool {
        matches!(self, CancelOutcome::Cancelled { count } if *count > 0)
    }

    pub fn message(&self) -> String {
        match self {
            CancelOutcome::Cancelled { count } => {
                format!("Cancelled {count} subscription(s); the yearly plan has been removed")
            }
            CancelOutcome::NoCustomer => {
                "No payment customer found for this email; local plan cleared".to_string()
            }
            CancelOutcome::NoActiveSubscriptions => {
                "No active subscriptions found; local plan cleared".to_string()
            }
        }
    }
}

/// Cancels every active provider subscription for `email` and clears the local plan.
///
/// The local plan is cleared even when the provider has nothing to cancel.
pub async fn cancel_subscription(
    state: &AppState,
    email: &str,
) -> Result<CancelOutcome, PaymentError> {
    state.config.require_stripe_secret_key()?;

    let record = match state.store.get_user_email(email).await {
        Ok(record) => record,
        Err(e) => {
            return Err(record_failure(
                state.store.as_ref(),
                "get_user_email",
                e,
                serde_json::json!({ "operation": "cancel_subscription" }),
            )
            .await);
        }
    };
    if record.is_none_or(|r| r.active_plan != ActivePlan::Yearly) {
        return Err(PaymentError::NotFound(
            "No active subscription found for this email".to_string(),
        ));
    }

    let outcome = match state.provider.find_customer_by_email(email).await? {
        None => CancelOutcome::NoCustomer,
        Some(customer_id) => {
            let subscriptions = state.provider.list_active_subscriptions(&customer_id).await?;
            for subscription_id in &subscriptions {
                state.provider.cancel_subscription(subscription_id).await?;
            }
            if subscriptions.is_empty() {
                CancelOutcome::NoActiveSubscriptions
            } else {
                CancelOutcome::Cancelled {
                    count: subscriptions.len(),
                }
            }
        }
    };

    if let Err(e) = state.store.clear_user_plan(email).await {
        return Err(record_failure(
            state.store.as_ref(),
            "clear_user_plan",
            e,
            serde_json::json!({ "operation": "cancel_subscription" }),
        )
        .await);
    }

    match outcome {
        CancelOutcome::Cancelled { count } => info!(count, "Subscriptions cancelled"),
        other => warn!(outcome = ?other, "Nothing to cancel at provider; local plan cleared"),
    }

    Ok(outcome)
}
