use bon::bon;
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::{
        ErrorLogEntry, Itinerary, NewItinerary, PaidSessionUpdate, PerformanceLogEntry, PlanGrant,
        RateLimitRecord, UserEmailRecord,
    },
};

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            info!("Database does not exist, creating it");
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pending sessions
    // -----------------------------------------------------------------------

    /// Marks a pending session as paid. Returns the number of rows touched.
    ///
    /// `plan_type` is only written when present in the update so that callers
    /// can retry without it against schemas that lack the column.
    #[builder]
    pub async fn mark_pending_session_paid(
        &self,
        id: Uuid,
        update: &PaidSessionUpdate,
    ) -> DbResult<u64> {
        let result = match update.plan_type {
            Some(plan_type) => {
                sqlx::query(
                    r#"
                    UPDATE pending_sessions
                    SET has_paid = TRUE,
                        paid_at = $2,
                        customer_email = $3,
                        plan_type = $4,
                        status = $5
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(update.paid_at)
                .bind(&update.customer_email)
                .bind(plan_type)
                .bind(PaidSessionUpdate::STATUS)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE pending_sessions
                    SET has_paid = TRUE,
                        paid_at = $2,
                        customer_email = $3,
                        status = $4
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(update.paid_at)
                .bind(&update.customer_email)
                .bind(PaidSessionUpdate::STATUS)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // User emails
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn get_user_email(&self, email: &str) -> DbResult<Option<UserEmailRecord>> {
        let record = sqlx::query_as::<_, UserEmailRecord>(
            r#"
            SELECT email, last_seen, active_plan, plan_renewal_at
            FROM user_emails
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Records that `email` was seen at `last_seen`, optionally granting a plan.
    #[builder]
    pub async fn upsert_user_email(
        &self,
        email: &str,
        last_seen: DateTime<Utc>,
        plan: Option<PlanGrant>,
    ) -> DbResult<()> {
        match plan {
            Some(grant) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_emails (email, last_seen, active_plan, plan_renewal_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (email) DO UPDATE
                    SET last_seen = EXCLUDED.last_seen,
                        active_plan = EXCLUDED.active_plan,
                        plan_renewal_at = EXCLUDED.plan_renewal_at
                    "#,
                )
                .bind(email)
                .bind(last_seen)
                .bind(grant.active_plan)
                .bind(grant.plan_renewal_at)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO user_emails (email, last_seen)
                    VALUES ($1, $2)
                    ON CONFLICT (email) DO UPDATE
                    SET last_seen = EXCLUDED.last_seen
                    "#,
                )
                .bind(email)
                .bind(last_seen)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    #[builder]
    pub async fn clear_user_plan(&self, email: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_emails
            SET active_plan = 'none',
                plan_renewal_at = NULL
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("user email", email));
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rate limits
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn get_rate_limit(&self, ip_address: &str) -> DbResult<Option<RateLimitRecord>> {
        let record = sqlx::query_as::<_, RateLimitRecord>(
            r#"
            SELECT ip_address, request_count, last_reset_at
            FROM rate_limits
            WHERE ip_address = $1
            "#,
        )
        .bind(ip_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Writes the counter row for an address, creating it on first sight.
    #[builder]
    pub async fn put_rate_limit(&self, record: &RateLimitRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_limits (ip_address, request_count, last_reset_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (ip_address) DO UPDATE
            SET request_count = EXCLUDED.request_count,
                last_reset_at = EXCLUDED.last_reset_at
            "#,
        )
        .bind(&record.ip_address)
        .bind(record.request_count)
        .bind(record.last_reset_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Webhooks and itineraries
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn try_claim_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops a claim so the provider's retry of the event is processed again.
    #[builder]
    pub async fn release_webhook_event(&self, event_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[builder]
    pub async fn create_itinerary(&self, itinerary: &NewItinerary) -> DbResult<Itinerary> {
        let id = Uuid::now_v7();

        let created = sqlx::query_as::<_, Itinerary>(
            r#"
            INSERT INTO itineraries (id, trip_id, title, start_date, end_date, days, checkout_session_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, trip_id, title, start_date, end_date, days, checkout_session_id, created_at
            "#,
        )
        .bind(id)
        .bind(&itinerary.trip_id)
        .bind(&itinerary.title)
        .bind(itinerary.start_date)
        .bind(itinerary.end_date)
        .bind(sqlx::types::Json(&itinerary.days))
        .bind(&itinerary.checkout_session_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    // -----------------------------------------------------------------------
    // Operational logs
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn insert_error_log(&self, entry: &ErrorLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO error_logs (id, function_name, message, context, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&entry.function_name)
        .bind(&entry.message)
        .bind(&entry.context)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[builder]
    pub async fn insert_performance_log(&self, entry: &PerformanceLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO performance_logs (id, function_name, duration_ms, success, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&entry.function_name)
        .bind(entry.duration_ms)
        .bind(entry.success)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
