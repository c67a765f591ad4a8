//! Retry with exponential back-off and jitter for gateway calls.
//!
//! [`retry_with_backoff`] wraps any fallible async gateway operation and
//! retries transport failures (timeout, connection reset, 5xx). Domain
//! rejections, session failures, and malformed responses are returned
//! immediately: retrying cannot fix them, and session failures have their
//! own recovery path in the synchronizer.

use std::future::Future;
use std::time::Duration;

use aircart_gateway::GatewayError;

/// Runs `operation` with up to `max_retries` additional attempts on
/// transport errors.
///
/// Back-off doubles per attempt from `backoff_base_ms`, with ±25% jitter,
/// capped at 10s. The synchronizer configures a single retry, which bounds
/// worst-case user-visible latency to two round trips plus one back-off.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    const MAX_DELAY_MS: u64 = 10_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transport() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient gateway error; retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
