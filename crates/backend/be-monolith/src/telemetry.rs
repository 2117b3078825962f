use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Starts Sentry for release builds when `SENTRY_DSN` is set.
///
/// The returned guard flushes pending events on drop and must outlive the server.
pub fn init_sentry() -> Option<sentry::ClientInitGuard> {
    if cfg!(debug_assertions) {
        return None;
    }

    let dsn = std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty())?;
    let environment = std::env::var("SENTRY_ENVIRONMENT")
        .ok()
        .filter(|s| !s.is_empty())
        .map(Into::into);

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment,
            traces_sample_rate: 0.0,
            send_default_pii: env_flag("SENTRY_SEND_PII"),
            debug: env_flag("SENTRY_DEBUG"),
            ..Default::default()
        },
    )))
}

/// Service crates at `app_level`, everything else at `WARN`, runtime internals silenced.
fn default_filter(app_level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("be_", app_level)
        .with_target("tower_http", app_level)
        .with_target("sqlx", LevelFilter::WARN)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("tokio", LevelFilter::OFF)
}

/// Installs the global subscriber. A non-empty `RUST_LOG` replaces the default filter.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let filter: Box<dyn Layer<Registry> + Send + Sync> =
        match std::env::var("RUST_LOG").ok().filter(|s| !s.trim().is_empty()) {
            Some(directives) => Box::new(EnvFilter::try_new(directives)?),
            None => Box::new(default_filter(app_level)),
        };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn default_filter_scopes_app_level_to_service_crates() {
        let filter = default_filter(LevelFilter::DEBUG);

        assert!(filter.would_enable("be_payment_service::verifier", &Level::DEBUG));
        assert!(filter.would_enable("tower_http::trace", &Level::DEBUG));
        assert!(!filter.would_enable("sqlx::query", &Level::INFO));
        assert!(!filter.would_enable("hyper::proto", &Level::ERROR));
        assert!(filter.would_enable("reqwest", &Level::WARN));
    }
}
