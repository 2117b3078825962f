use crate::error::PaymentError;

/// Settings the payment endpoints need, read once at startup.
///
/// Secrets are optional here so that a partially configured deployment still
/// boots; each endpoint demands what it needs before doing any work.
#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub public_base_url: Option<String>,
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        Self {
            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            public_base_url: non_empty_var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn require_stripe_secret_key(&self) -> Result<&str, PaymentError> {
        self.stripe_secret_key.as_deref().ok_or_else(|| {
            PaymentError::Config("STRIPE_SECRET_KEY environment variable must be set".into())
        })
    }

    pub fn require_stripe_webhook_secret(&self) -> Result<&str, PaymentError> {
        self.stripe_webhook_secret.as_deref().ok_or_else(|| {
            PaymentError::Config("STRIPE_WEBHOOK_SECRET environment variable must be set".into())
        })
    }

    pub fn require_public_base_url(&self) -> Result<&str, PaymentError> {
        self.public_base_url.as_deref().ok_or_else(|| {
            PaymentError::Config("PUBLIC_BASE_URL environment variable must be set".into())
        })
    }

    /// Names of required variables that are absent, for the startup log.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("STRIPE_SECRET_KEY", self.stripe_secret_key.is_none()),
            ("STRIPE_WEBHOOK_SECRET", self.stripe_webhook_secret.is_none()),
            ("PUBLIC_BASE_URL", self.public_base_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
