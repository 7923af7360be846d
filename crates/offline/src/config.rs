//! Remote service configuration from the environment.

/// Connection settings for the hosted remote data service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote service.
    pub url: String,
    /// Publishable API key sent as the bearer token.
    pub api_key: String,
    /// Privileged key for administrative operations.
    pub service_key: String,
}

impl RemoteConfig {
    /// Read configuration from `TILLPOINT_REMOTE_URL`, `TILLPOINT_REMOTE_KEY`
    /// and `TILLPOINT_SERVICE_KEY`.
    ///
    /// Missing variables fall back to development-only values and log a
    /// warning; production deployments must set all three.
    pub fn from_env() -> Self {
        Self {
            url: env_or_dev("TILLPOINT_REMOTE_URL", "http://localhost:54321"),
            api_key: env_or_dev("TILLPOINT_REMOTE_KEY", "dev-anon-key"),
            service_key: env_or_dev("TILLPOINT_SERVICE_KEY", "dev-service-key"),
        }
    }
}

fn env_or_dev(name: &str, fallback: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            tracing::warn!(var = name, "not set; using development fallback");
            fallback.to_string()
        }
    }
}
