use async_trait::async_trait;
use be_remote_db::{
    DatabaseManager, DbError, DbResult, ErrorLogEntry, Itinerary, NewItinerary, PaidSessionUpdate,
    PerformanceLogEntry, PlanGrant, UserEmailRecord,
};
use chrono::{DateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::PaymentError;

/// Persistence used by the verification, webhook and subscription flows.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Returns the number of pending sessions updated (0 or 1).
    async fn mark_pending_session_paid(
        &self,
        id: Uuid,
        update: &PaidSessionUpdate,
    ) -> DbResult<u64>;

    async fn upsert_user_email(
        &self,
        email: &str,
        last_seen: DateTime<Utc>,
        plan: Option<PlanGrant>,
    ) -> DbResult<()>;

    async fn get_user_email(&self, email: &str) -> DbResult<Option<UserEmailRecord>>;

    async fn clear_user_plan(&self, email: &str) -> DbResult<()>;

    /// Returns false when the event id was already claimed.
    async fn try_claim_webhook_event(&self, event_id: &str, event_type: &str) -> DbResult<bool>;

    async fn release_webhook_event(&self, event_id: &str) -> DbResult<()>;

    async fn create_itinerary(&self, itinerary: &NewItinerary) -> DbResult<Itinerary>;

    async fn log_error(&self, entry: &ErrorLogEntry) -> DbResult<()>;

    async fn log_performance(&self, entry: &PerformanceLogEntry) -> DbResult<()>;
}

#[async_trait]
impl PaymentStore for DatabaseManager {
    async fn mark_pending_session_paid(
        &self,
        id: Uuid,
        update: &PaidSessionUpdate,
    ) -> DbResult<u64> {
        DatabaseManager::mark_pending_session_paid(self)
            .id(id)
            .update(update)
            .call()
            .await
    }

    async fn upsert_user_email(
        &self,
        email: &str,
        last_seen: DateTime<Utc>,
        plan: Option<PlanGrant>,
    ) -> DbResult<()> {
        DatabaseManager::upsert_user_email(self)
            .email(email)
            .last_seen(last_seen)
            .maybe_plan(plan)
            .call()
            .await
    }

    async fn get_user_email(&self, email: &str) -> DbResult<Option<UserEmailRecord>> {
        DatabaseManager::get_user_email(self).email(email).call().await
    }

    async fn clear_user_plan(&self, email: &str) -> DbResult<()> {
        DatabaseManager::clear_user_plan(self).email(email).call().await
    }

    async fn try_claim_webhook_event(&self, event_id: &str, event_type: &str) -> DbResult<bool> {
        DatabaseManager::try_claim_webhook_event(self)
            .event_id(event_id)
            .event_type(event_type)
            .call()
            .await
    }

    async fn release_webhook_event(&self, event_id: &str) -> DbResult<()> {
        DatabaseManager::release_webhook_event(self)
            .event_id(event_id)
            .call()
            .await
    }

    async fn create_itinerary(&self, itinerary: &NewItinerary) -> DbResult<Itinerary> {
        DatabaseManager::create_itinerary(self)
            .itinerary(itinerary)
            .call()
            .await
    }

    async fn log_error(&self, entry: &ErrorLogEntry) -> DbResult<()> {
        self.insert_error_log().entry(entry).call().await
    }

    async fn log_performance(&self, entry: &PerformanceLogEntry) -> DbResult<()> {
        self.insert_performance_log().entry(entry).call().await
    }
}

/// Writes an `error_logs` row for `err` and converts it for the caller.
///
/// A failure to write the log row is only traced.
pub async fn record_failure(
    store: &dyn PaymentStore,
    function_name: &str,
    err: DbError,
    context: serde_json::Value,
) -> PaymentError {
    error!(function_name, error = %err, "Persistence failure");

    let entry = ErrorLogEntry {
        function_name: function_name.to_string(),
        message: err.to_string(),
        context,
    };
    if let Err(log_err) = store.log_error(&entry).await {
        warn!(error = %log_err, "Failed to write error log");
    }

    PaymentError::Database(err)
}

#[cfg(test)]
pub use memory::InMemoryPaymentStore;
