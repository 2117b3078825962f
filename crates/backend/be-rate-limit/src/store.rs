use async_trait::async_trait;
use be_remote_db::{DatabaseManager, DbResult, RateLimitRecord};

/// Persistence for per-client counters.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, client_id: &str) -> DbResult<Option<RateLimitRecord>>;

    async fn put(&self, record: &RateLimitRecord) -> DbResult<()>;
}

#[async_trait]
impl RateLimitStore for DatabaseManager {
    async fn get(&self, client_id: &str) -> DbResult<Option<RateLimitRecord>> {
        self.get_rate_limit().ip_address(client_id).call().await
    }

    async fn put(&self, record: &RateLimitRecord) -> DbResult<()> {
        self.put_rate_limit().record(record).call().await
    }
}

/// Process-local counters for tests. Not compiled into release builds.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: parking_lot::Mutex<std::collections::HashMap<String, RateLimitRecord>>,
}

#[cfg(any(test, feature = "test-support"))]
impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, client_id: &str) -> Option<RateLimitRecord> {
        self.records.lock().get(client_id).cloned()
    }

    pub fn insert(&self, record: RateLimitRecord) {
        self.records.lock().insert(record.ip_address.clone(), record);
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, client_id: &str) -> DbResult<Option<RateLimitRecord>> {
        Ok(self.record(client_id))
    }

    async fn put(&self, record: &RateLimitRecord) -> DbResult<()> {
        self.insert(record.clone());
        Ok(())
    }
}
