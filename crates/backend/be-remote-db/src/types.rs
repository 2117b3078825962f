use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// What a completed checkout bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    OneTime,
    Yearly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::OneTime => "one_time",
            PlanType::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurring entitlement held by an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[sqlx(type_name = "active_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivePlan {
    #[default]
    None,
    Yearly,
}

impl std::fmt::Display for ActivePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivePlan::None => write!(f, "none"),
            ActivePlan::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PendingSession {
    pub id: Uuid,
    pub has_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub customer_email: Option<String>,
    pub plan_type: Option<PlanType>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Columns written when a pending session is confirmed as paid.
///
/// `plan_type` is optional because some deployments predate that column.
#[derive(Debug, Clone, PartialEq)]
pub struct PaidSessionUpdate {
    pub paid_at: DateTime<Utc>,
    pub customer_email: Option<String>,
    pub plan_type: Option<PlanType>,
}

impl PaidSessionUpdate {
    pub const STATUS: &'static str = "paid";

    /// The same update with every optional column dropped.
    pub fn without_optional_columns(&self) -> Self {
        Self {
            plan_type: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserEmailRecord {
    pub email: String,
    pub last_seen: DateTime<Utc>,
    pub active_plan: ActivePlan,
    pub plan_renewal_at: Option<DateTime<Utc>>,
}

impl UserEmailRecord {
    /// A yearly plan counts until its renewal date passes; a missing date never expires.
    pub fn has_active_yearly_plan(&self, now: DateTime<Utc>) -> bool {
        self.active_plan == ActivePlan::Yearly
            && self.plan_renewal_at.is_none_or(|renewal| renewal > now)
    }
}

/// Plan columns of a user-email upsert. `None` leaves an existing plan untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanGrant {
    pub active_plan: ActivePlan,
    pub plan_renewal_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RateLimitRecord {
    pub ip_address: String,
    pub request_count: i32,
    pub last_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItinerary {
    pub trip_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<ItineraryDay>,
    pub checkout_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Itinerary {
    pub id: Uuid,
    pub trip_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: sqlx::types::Json<Vec<ItineraryDay>>,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub function_name: String,
    pub message: String,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLogEntry {
    pub function_name: String,
    pub duration_ms: i64,
    pub success: bool,
}
