//! Bounded retry for transient transport failures.
//!
//! Retries connect errors, timeouts, and 5xx responses up to three
//! attempts with a doubling backoff starting at 250ms. 4xx responses are
//! returned immediately — the request will not get better by repeating
//! it.

use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

/// Run `send` until it succeeds, the error is non-retryable, or attempts
/// run out. Returns the last response or error either way.
pub(crate) async fn retry_send<F, Fut>(mut send: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut attempt = 1;

    loop {
        match send().await {
            Ok(resp) if resp.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    status = resp.status().as_u16(),
                    attempt,
                    "provider returned server error, retrying"
                );
            }
            Ok(resp) => return Ok(resp),
            Err(e) if (e.is_connect() || e.is_timeout()) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(error = %e, attempt, "transient provider error, retrying");
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(backoff).await;
        backoff *= 2;
        attempt += 1;
    }
}
