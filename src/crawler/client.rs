//! Shared HTTP client configuration and the 429-retrying page fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{Result, WftsError};

use super::ratelimiter::RateLimiter;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const RETRY_BACKOFF: Duration = Duration::from_secs(30);
pub const NUM_TRIES: u32 = 3;

pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(15))
        .use_rustls_tls()
        .build()
}

/// Fetches `url`'s HTML body, retrying on 429 up to `NUM_TRIES` times with a
/// fixed backoff. Non-2xx/non-429 responses and non-HTML content types are
/// permanent errors for this URL.
pub async fn get_html(
    client: &reqwest::Client,
    url: &str,
    limiter: &RateLimiter,
    cancelled: &Arc<AtomicBool>,
) -> Result<String> {
    let mut tries_left = NUM_TRIES;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(WftsError::Cancelled);
        }
        limiter.get_token(cancelled).await;
        if cancelled.load(Ordering::SeqCst) {
            return Err(WftsError::Cancelled);
        }

        let resp = client
            .get(url)
            .header("Accept", "text/html")
            .send()
            .await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            if tries_left == 0 {
                return Err(WftsError::HttpTransient(
                    "max retries reached on 429".to_string(),
                ));
            }
            tries_left -= 1;
            tokio::time::sleep(RETRY_BACKOFF).await;
            continue;
        }

        if !resp.status().is_success() {
            return Err(WftsError::HttpPermanent(format!(
                "non-2xx status: {}",
                resp.status()
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("text/html") {
            return Err(WftsError::HttpPermanent(format!(
                "unsupported content type: {content_type}"
            )));
        }

        return Ok(resp.text().await?);
    }
}
