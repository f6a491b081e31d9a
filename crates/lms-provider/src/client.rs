//! HTTP client for the provider feed.
//!
//! Path convention: `{base_url}/api/v1/licenses?page={n}&size={s}`.
//! The feed is read-only; the stack never writes back.

use std::time::Duration;

use crate::config::{ConfigError, ProviderConfig};
use crate::error::ProviderError;
use crate::types::ProviderPage;

const API_PREFIX: &str = "api/v1";

/// Client for the provider license feed.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: url::Url,
    page_size: u32,
}

impl ProviderClient {
    /// Create a new provider client from configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!(
                        "Bearer {}",
                        config.api_token.as_str()
                    ))
                    .map_err(|_| ProviderError::Config(ConfigError::MissingToken))?,
                );
                headers
            })
            .build()
            .map_err(|e| ProviderError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url,
            page_size: config.page_size,
        })
    }

    /// Fetch one page of the license feed.
    ///
    /// Calls `GET {base_url}/api/v1/licenses?page={page}&size={page_size}`.
    pub async fn fetch_page(&self, page: u32) -> Result<ProviderPage, ProviderError> {
        let endpoint = format!("GET /licenses?page={page}");
        let url = format!(
            "{}{}/licenses?page={page}&size={}",
            self.base_url, API_PREFIX, self.page_size
        );

        let resp = crate::retry::retry_send(|| self.http.get(&url).send())
            .await
            .map_err(|e| ProviderError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                endpoint,
                status,
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Deserialization {
                endpoint,
                source: e,
            })
    }
}
