use anyhow::{Context, bail};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const MAX_ATTEMPTS: u32 = 3;
/// Longest server-requested pause honored before giving up on a retry.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Sends the request built by `build`, retrying rate-limit and unavailable
/// responses. Statuses in `accepted` are returned to the caller as-is.
pub async fn send_with_retry<F>(mut build: F, accepted: &[StatusCode]) -> anyhow::Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let response = build().send().await.context("send request")?;
        let status = response.status();
        if status.is_success() || accepted.contains(&status) {
            return Ok(response);
        }
        if is_retryable(status) && attempt < MAX_ATTEMPTS {
            let delay = retry_delay_from_headers(response.headers())
                .unwrap_or(Duration::from_secs(1))
                .min(MAX_RETRY_DELAY);
            debug!(%status, attempt, delay_secs = delay.as_secs(), "retrying request");
            let _ = response.bytes().await;
            tokio::time::sleep(delay).await;
            continue;
        }
        let body = response.text().await.unwrap_or_default();
        bail!("request failed with {status}: {}", body.trim());
    }
    bail!("request failed after {MAX_ATTEMPTS} attempts");
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY
    )
}

fn retry_delay_from_headers(headers: &HeaderMap) -> Option<Duration> {
    retry_after_seconds(headers)
        .or_else(|| ratelimit_reset_seconds(headers))
        .map(Duration::from_secs)
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

fn ratelimit_reset_seconds(headers: &HeaderMap) -> Option<u64> {
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    reset.checked_sub(now).filter(|delay| *delay > 0)
}
