use std::collections::HashMap;

use be_remote_db::{ItineraryDay, NewItinerary};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::service::AppState;
use crate::store::record_failure;
use crate::types::{ProviderEvent, ProviderEventKind};

/// Checkout metadata key carrying the purchased itinerary as JSON.
pub const ITINERARY_METADATA_KEY: &str = "itinerary";

#[derive(Debug, Deserialize)]
struct ItineraryMetadata {
    trip_id: String,
    title: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    days: Vec<ItineraryDay>,
}

/// What a verified webhook delivery resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The event id was processed by an earlier delivery.
    Duplicate,
    ItineraryCreated { id: Uuid, share_url: String },
    /// A completed checkout without usable itinerary metadata.
    MetadataSkipped { reason: String },
    Ignored { event_type: String },
}

/// Parses the itinerary carried in checkout metadata.
///
/// `Ok(None)` means the key is absent.
pub fn itinerary_from_metadata(
    metadata: &HashMap<String, String>,
    checkout_session_id: &str,
) -> Result<Option<NewItinerary>, String> {
    let Some(raw) = metadata.get(ITINERARY_METADATA_KEY) else {
        return Ok(None);
    };

    let parsed: ItineraryMetadata =
        serde_json::from_str(raw).map_err(|e| format!("malformed itinerary metadata: {e}"))?;
    if parsed.trip_id.trim().is_empty() {
        return Err("itinerary metadata has an empty trip_id".to_string());
    }
    if parsed.end_date < parsed.start_date {
        return Err("itinerary ends before it starts".to_string());
    }

    Ok(Some(NewItinerary {
        trip_id: parsed.trip_id,
        title: parsed.title,
        start_date: parsed.start_date,
        end_date: parsed.end_date,
        days: parsed.days,
        checkout_session_id: Some(checkout_session_id.to_string()),
    }))
}

pub fn share_url(public_base_url: &str, itinerary_id: Uuid) -> String {
    format!("{public_base_url}/itinerary/{itinerary_id}")
}

/// Verifies a raw webhook delivery and applies its side effects once per event id.
///
/// A failed delivery releases its claim so the provider's retry is processed.
pub async fn process_event(
    state: &AppState,
    payload: &str,
    signature: Option<&str>,
) -> Result<WebhookOutcome, PaymentError> {
    let secret = state.config.require_stripe_webhook_secret()?;
    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or(PaymentError::WebhookSignatureInvalid)?;
    let event = state.provider.construct_event(payload, signature, secret)?;

    let claimed = match state
        .store
        .try_claim_webhook_event(&event.id, &event.event_type)
        .await
    {
        Ok(claimed) => claimed,
        Err(e) => {
            return Err(record_failure(
                state.store.as_ref(),
                "try_claim_webhook_event",
                e,
                serde_json::json!({ "event_id": event.id }),
            )
            .await);
        }
    };
    if !claimed {
        info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook event");
        return Ok(WebhookOutcome::Duplicate);
    }

    match handle_event(state, &event).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if let Err(release_err) = state.store.release_webhook_event(&event.id).await {
                warn!(event_id = %event.id, error = %release_err, "Failed to release webhook claim");
            }
            Err(err)
        }
    }
}

async fn handle_event(
    state: &AppState,
    event: &ProviderEvent,
) -> Result<WebhookOutcome, PaymentError> {
    let ProviderEventKind::CheckoutCompleted {
        session_id,
        metadata,
    } = &event.kind
    else {
        info!(event_id = %event.id, event_type = %event.event_type, "Unhandled webhook event");
        return Ok(WebhookOutcome::Ignored {
            event_type: event.event_type.clone(),
        });
    };

    let itinerary = match itinerary_from_metadata(metadata, session_id) {
        Ok(Some(itinerary)) => itinerary,
        Ok(None) => {
            warn!(session_id = %session_id, "Completed checkout carries no itinerary metadata");
            return Ok(WebhookOutcome::MetadataSkipped {
                reason: "no itinerary metadata".to_string(),
            });
        }
        Err(reason) => {
            warn!(session_id = %session_id, %reason, "Skipping itinerary metadata");
            return Ok(WebhookOutcome::MetadataSkipped { reason });
        }
    };

    let base_url = state.config.require_public_base_url()?;
    let created = match state.store.create_itinerary(&itinerary).await {
        Ok(created) => created,
        Err(e) => {
            return Err(record_failure(
                state.store.as_ref(),
                "create_itinerary",
                e,
                serde_json::json!({ "session_id": session_id, "trip_id": itinerary.trip_id }),
            )
            .await);
        }
    };

    let share_url = share_url(base_url, created.id);
    info!(
        itinerary_id = %created.id,
        trip_id = %created.trip_id,
        %share_url,
        "Itinerary created from checkout"
    );

    Ok(WebhookOutcome::ItineraryCreated {
        id: created.id,
        share_url,
    })
}
