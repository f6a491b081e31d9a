//! Provider client errors.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors from the provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration problem (missing token, bad URL).
    #[error("provider configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level failure after retries were exhausted.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// The endpoint that failed, e.g. `"GET /licenses?page=3"`.
        endpoint: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The provider returned a non-success status.
    #[error("provider API error at {endpoint}: HTTP {status}: {body}")]
    Api {
        /// The endpoint that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// The endpoint whose response was malformed.
        endpoint: String,
        /// The underlying reqwest/serde error.
        #[source]
        source: reqwest::Error,
    },
}
