//! Provider client configuration.
//!
//! Loaded from environment variables; override via explicit construction
//! for staging or testing.

use url::Url;

/// Configuration for connecting to the licensing provider.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider feed.
    pub base_url: Url,
    /// Bearer token for API authentication.
    pub api_token: String,
    /// Request timeout in seconds. This bounds each page fetch so one
    /// slow provider call cannot stall a whole reconciliation run.
    pub timeout_secs: u64,
    /// Records per page requested from the feed.
    pub page_size: u32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ProviderConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LMS_PROVIDER_URL` (required)
    /// - `LMS_PROVIDER_TOKEN` (required)
    /// - `LMS_PROVIDER_TIMEOUT_SECS` (default: 30)
    /// - `LMS_PROVIDER_PAGE_SIZE` (default: 200)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url =
            std::env::var("LMS_PROVIDER_URL").map_err(|_| ConfigError::MissingUrl)?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("LMS_PROVIDER_URL".to_string(), e.to_string()))?;
        let api_token =
            std::env::var("LMS_PROVIDER_TOKEN").map_err(|_| ConfigError::MissingToken)?;

        Ok(Self {
            base_url,
            api_token,
            timeout_secs: std::env::var("LMS_PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            page_size: std::env::var("LMS_PROVIDER_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
        })
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be parsed
    /// (should not occur for valid port numbers, but avoids `expect()`).
    pub fn local_mock(port: u16, token: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_token: token.to_string(),
            timeout_secs: 5,
            page_size: 50,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LMS_PROVIDER_URL environment variable is required")]
    MissingUrl,
    #[error("LMS_PROVIDER_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = ProviderConfig::local_mock(9000, "test-token").unwrap();
        assert_eq!(cfg.api_token, "test-token");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ProviderConfig::local_mock(9000, "super-secret").unwrap();
        let debug = format!("{cfg:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }
}
