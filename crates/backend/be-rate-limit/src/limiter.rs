use std::sync::Arc;
use std::time::Duration;

use be_remote_db::{DbError, RateLimitRecord};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::store::RateLimitStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_requests = std::env::var("RATE_LIMIT_MAX_REQUESTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_requests);
        let window = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.window);

        Self {
            max_requests,
            window,
        }
    }
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    Allowed {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Denied {
        reset_at: DateTime<Utc>,
    },
    /// The check itself failed; the request is not limited.
    Indeterminate { reason: String },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateLimitDecision::Denied { .. })
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitDecision::Allowed { remaining, .. } => Some(*remaining),
            RateLimitDecision::Denied { .. } => Some(0),
            RateLimitDecision::Indeterminate { .. } => None,
        }
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RateLimitDecision::Allowed { reset_at, .. }
            | RateLimitDecision::Denied { reset_at } => Some(*reset_at),
            RateLimitDecision::Indeterminate { .. } => None,
        }
    }
}

pub struct RateLimiter {
    store: Option<Arc<dyn RateLimitStore>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self {
            store: Some(store),
            config,
        }
    }

    /// A limiter with no backing store. Every check is indeterminate.
    pub fn unconfigured(config: RateLimitConfig) -> Self {
        Self {
            store: None,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Checks `client_id` against the configured limit and window.
    pub async fn check(&self, client_id: &str) -> RateLimitDecision {
        self.check_rate_limit(client_id, self.config.max_requests, self.config.window)
            .await
    }

    pub async fn check_rate_limit(
        &self,
        client_id: &str,
        limit: u32,
        window: Duration,
    ) -> RateLimitDecision {
        self.check_at(client_id, limit, window, Utc::now()).await
    }

    pub(crate) async fn check_at(
        &self,
        client_id: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let Some(store) = self.store.as_deref() else {
            return indeterminate(client_id, "rate limit store is not configured".to_string());
        };
        let window = match TimeDelta::from_std(window) {
            Ok(window) => window,
            Err(e) => return indeterminate(client_id, format!("invalid window: {e}")),
        };

        match count_request(store, client_id, limit, window, now).await {
            Ok(decision) => {
                debug!(client_id, ?decision, "Rate limit checked");
                decision
            }
            Err(e) => indeterminate(client_id, e.to_string()),
        }
    }
}

fn indeterminate(client_id: &str, reason: String) -> RateLimitDecision {
    warn!(client_id, %reason, "Rate limit check failed, allowing request");
    RateLimitDecision::Indeterminate { reason }
}

async fn count_request(
    store: &dyn RateLimitStore,
    client_id: &str,
    limit: u32,
    window: TimeDelta,
    now: DateTime<Utc>,
) -> Result<RateLimitDecision, DbError> {
    let existing = store.get(client_id).await?;

    let Some(record) = existing.filter(|r| now - r.last_reset_at < window) else {
        // A fresh window always admits its first request.
        let record = RateLimitRecord {
            ip_address: client_id.to_string(),
            request_count: 1,
            last_reset_at: now,
        };
        store.put(&record).await?;
        return Ok(RateLimitDecision::Allowed {
            remaining: limit.saturating_sub(1),
            reset_at: now + window,
        });
    };

    let record = RateLimitRecord {
        request_count: record.request_count.saturating_add(1),
        ..record
    };
    store.put(&record).await?;

    let count = u32::try_from(record.request_count).unwrap_or(u32::MAX);
    let reset_at = record.last_reset_at + window;

    if count <= limit {
        Ok(RateLimitDecision::Allowed {
            remaining: limit - count,
            reset_at,
        })
    } else {
        Ok(RateLimitDecision::Denied { reset_at })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use be_remote_db::DbResult;

    use super::*;
    use crate::store::InMemoryRateLimitStore;

    struct UnreachableStore;

    #[async_trait]
    impl RateLimitStore for UnreachableStore {
        async fn get(&self, _client_id: &str) -> DbResult<Option<RateLimitRecord>> {
            Err(DbError::connection("connection refused"))
        }

        async fn put(&self, _record: &RateLimitRecord) -> DbResult<()> {
            Err(DbError::connection("connection refused"))
        }
    }

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(store: Arc<InMemoryRateLimitStore>) -> RateLimiter {
        RateLimiter::new(store, RateLimitConfig::default())
    }

    #[tokio::test]
    async fn first_request_creates_counter() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = limiter(store.clone());
        let now = Utc::now();

        let decision = limiter.check_at("203.0.113.7", 5, WINDOW, now).await;

        assert_eq!(
            decision,
            RateLimitDecision::Allowed {
                remaining: 4,
                reset_at: now + TimeDelta::seconds(60),
            }
        );
        let record = store.record("203.0.113.7").unwrap();
        assert_eq!(record.request_count, 1);
        assert_eq!(record.last_reset_at, now);
    }

    #[tokio::test]
    async fn zero_limit_still_admits_first_request_in_window() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = limiter(store.clone());
        let now = Utc::now();

        let first = limiter.check_at("client", 0, WINDOW, now).await;
        assert_eq!(
            first,
            RateLimitDecision::Allowed {
                remaining: 0,
                reset_at: now + TimeDelta::seconds(60),
            }
        );

        let second = limiter
            .check_at("client", 0, WINDOW, now + TimeDelta::seconds(1))
            .await;
        assert_eq!(
            second,
            RateLimitDecision::Denied {
                reset_at: now + TimeDelta::seconds(60),
            }
        );

        // A new window admits one request again.
        let later = now + TimeDelta::seconds(61);
        assert!(limiter.check_at("client", 0, WINDOW, later).await.is_allowed());
        assert_eq!(store.record("client").unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn request_past_limit_is_denied() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = limiter(store.clone());
        let now = Utc::now();
        let limit = 3;

        for i in 0..limit {
            let at = now + TimeDelta::seconds(i64::from(i));
            assert!(limiter.check_at("client", limit, WINDOW, at).await.is_allowed());
        }

        let decision = limiter
            .check_at("client", limit, WINDOW, now + TimeDelta::seconds(10))
            .await;
        assert!(!decision.is_allowed());
        assert_eq!(decision.remaining(), Some(0));
        assert_eq!(decision.reset_at(), Some(now + TimeDelta::seconds(60)));
    }

    #[tokio::test]
    async fn elapsed_window_resets_counter() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let now = Utc::now();
        let limit = 5;
        store.insert(RateLimitRecord {
            ip_address: "client".into(),
            request_count: limit as i32,
            last_reset_at: now - TimeDelta::seconds(60) - TimeDelta::milliseconds(1),
        });

        let decision = limiter(store.clone()).check_at("client", limit, WINDOW, now).await;

        assert!(decision.is_allowed());
        assert_eq!(decision.remaining(), Some(limit - 1));
        let record = store.record("client").unwrap();
        assert_eq!(record.request_count, 1);
        assert_eq!(record.last_reset_at, now);
    }

    #[tokio::test]
    async fn window_boundary_counts_as_elapsed() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let now = Utc::now();
        store.insert(RateLimitRecord {
            ip_address: "client".into(),
            request_count: 9,
            last_reset_at: now - TimeDelta::seconds(60),
        });

        limiter(store.clone()).check_at("client", 5, WINDOW, now).await;

        assert_eq!(store.record("client").unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = limiter(store.clone());
        let now = Utc::now();

        assert!(limiter.check_at("a", 1, WINDOW, now).await.is_allowed());
        assert!(!limiter.check_at("a", 1, WINDOW, now).await.is_allowed());
        assert!(limiter.check_at("b", 1, WINDOW, now).await.is_allowed());
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        let limiter = RateLimiter::new(Arc::new(UnreachableStore), RateLimitConfig::default());

        for limit in [0, 1, 100] {
            let decision = limiter.check_rate_limit("client", limit, WINDOW).await;
            assert!(decision.is_allowed());
            assert!(matches!(decision, RateLimitDecision::Indeterminate { .. }));
        }
    }

    #[tokio::test]
    async fn missing_store_fails_open() {
        let limiter = RateLimiter::unconfigured(RateLimitConfig::default());

        let decision = limiter.check("client").await;

        assert!(decision.is_allowed());
        assert_eq!(decision.remaining(), None);
    }
}
