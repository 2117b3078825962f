use std::time::Duration;

use posthog_rs::Event;
use tracing::warn;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

fn capture_async(event: Event) {
    tokio::spawn(async move {
        match tokio::time::timeout(CAPTURE_TIMEOUT, posthog_rs::capture(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to capture analytics event: {e}"),
            Err(_) => warn!("Analytics event capture timed out"),
        }
    });
}

pub fn track_session_verified(has_paid: bool, mode: &str) {
    let mut event = Event::new_anon("payment_session_verified");
    event.insert_prop("has_paid", has_paid).ok();
    event.insert_prop("mode", mode).ok();
    capture_async(event);
}

pub fn track_session_verification_failed(error_kind: &str) {
    let mut event = Event::new_anon("payment_session_verification_failed");
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_webhook_itinerary_created() {
    capture_async(Event::new_anon("webhook_itinerary_created"));
}

pub fn track_webhook_duplicate() {
    capture_async(Event::new_anon("webhook_duplicate_event"));
}

pub fn track_subscription_checked(is_subscribed: bool) {
    let mut event = Event::new_anon("subscription_status_checked");
    event.insert_prop("is_subscribed", is_subscribed).ok();
    capture_async(event);
}

pub fn track_subscription_cancelled(cancelled: usize) {
    let mut event = Event::new_anon("subscription_cancelled");
    event.insert_prop("cancelled_count", cancelled).ok();
    capture_async(event);
}

pub fn track_subscription_cancel_failed(error_kind: &str) {
    let mut event = Event::new_anon("subscription_cancel_failed");
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}
