use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Smart-farm API client configuration.
///
/// The base URL is the only required field and is a constructor parameter.
///
/// ```rust,ignore
/// use smartfarm_api::ClientConfig;
///
/// let config = ClientConfig::new("https://api.example.com".parse()?)
///     .with_default_timeout(std::time::Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) default_timeout: Option<Duration>,
    pub(crate) clear_session_on_auth_failure: bool,
}

impl ClientConfig {
    /// Create a configuration for the given API base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_timeout: None,
            clear_session_on_auth_failure: true,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `SMARTFARM_API_URL` (or `SMARTFARM_API_BASE_URL`): API base URL
    ///
    /// # Optional env vars
    /// - `SMARTFARM_API_TIMEOUT_MS`: default per-call timeout in milliseconds
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let raw = std::env::var("SMARTFARM_API_URL")
            .or_else(|_| std::env::var("SMARTFARM_API_BASE_URL"))
            .map_err(|_| {
                Error::Config(
                    "base url is not configured. Set SMARTFARM_API_URL or SMARTFARM_API_BASE_URL."
                        .into(),
                )
            })?;
        let base_url: Url = raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("SMARTFARM_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(ms) = std::env::var("SMARTFARM_API_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("SMARTFARM_API_TIMEOUT_MS: {e}")))?;
            config = config.with_default_timeout(Duration::from_millis(ms));
        }

        Ok(config)
    }

    /// Timeout applied to calls whose request preset does not carry one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Whether a 403, a rejected refresh, or a 401 on the retried call clears
    /// the stored session (default: `true`).
    #[must_use]
    pub fn with_clear_session_on_auth_failure(mut self, clear: bool) -> Self {
        self.clear_session_on_auth_failure = clear;
        self
    }

    /// API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Full URL for an endpoint path such as `/sensor/recent`.
    pub(crate) fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined
            .parse()
            .map_err(|e| Error::Config(format!("invalid endpoint url {joined}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        let config = ClientConfig::new("https://api.example.com/v1/".parse().unwrap());
        let url = config.endpoint_url("/sensor/recent").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/sensor/recent");
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());
        assert_eq!(config.default_timeout(), None);
        assert!(config.clear_session_on_auth_failure);
    }

    #[test]
    fn overrides() {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap())
            .with_default_timeout(Duration::from_secs(5))
            .with_clear_session_on_auth_failure(false);
        assert_eq!(config.default_timeout(), Some(Duration::from_secs(5)));
        assert!(!config.clear_session_on_auth_failure);
    }
}
