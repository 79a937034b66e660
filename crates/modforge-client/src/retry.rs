//! Retry with exponential backoff for runtime HTTP calls.
//!
//! Connection failures and 502/503/504 responses are retried: the runtime did
//! not apply anything. Timeouts are retried only for idempotent reads; a
//! timed-out install may already have been applied and must not be resent.
//! Every other response is returned to the caller as-is.

use reqwest::StatusCode;

use crate::config::RetryPolicy;

/// Whether repeating the request is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Idempotency {
    Idempotent,
    NonIdempotent,
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_transient_error(e: &reqwest::Error, mode: Idempotency) -> bool {
    e.is_connect() || (mode == Idempotency::Idempotent && e.is_timeout())
}

/// Send a request built by `f`, retrying transient failures under `policy`.
///
/// `f` is called at most `policy.max_retries + 1` times. The last response or
/// error is returned unchanged, so a final 503 reaches the caller as a
/// response.
pub(crate) async fn retry_send<F, Fut>(
    policy: &RetryPolicy,
    mode: Idempotency,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let result = f().await;
        let retry = match &result {
            Ok(resp) => is_transient_status(resp.status()),
            Err(e) => is_transient_error(e, mode),
        };
        if !retry || attempt >= policy.max_retries {
            return result;
        }
        let delay = policy.delay(attempt);
        match &result {
            Ok(resp) => tracing::warn!(
                endpoint,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                status = resp.status().as_u16(),
                "runtime request failed transiently, retrying in {delay:?}"
            ),
            Err(e) => tracing::warn!(
                endpoint,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                "runtime request failed, retrying in {delay:?}: {e}"
            ),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn gateway_statuses_are_transient() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn connection_failures_exhaust_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            backoff_factor: 2,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let result = retry_send(&policy, Idempotency::NonIdempotent, "GET /", || {
            calls.fetch_add(1, Ordering::SeqCst);
            client.get("http://127.0.0.1:1/").send()
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
