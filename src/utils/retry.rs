//! Bounded polling with a fixed delay.

use std::future::Future;
use std::time::Duration;

/// Returned when every polling attempt came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("gave up after {attempts} attempts")]
pub struct RetryExhausted {
    /// Number of attempts made.
    pub attempts: u32,
}

/// Poll `probe` until it yields a value, at most `max_attempts` times.
///
/// Sleeps `delay` between attempts (not after the last one). A zero
/// `max_attempts` still probes once.
pub async fn poll_until<T, F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut probe: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if let Some(value) = probe(attempt).await {
            return Ok(value);
        }
        if attempt < max_attempts {
            tracing::debug!(attempt, max_attempts, "Poll attempt empty, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    Err(RetryExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_on_later_attempt() {
        let result = poll_until(5, Duration::from_millis(100), |attempt| async move {
            (attempt == 3).then_some(attempt)
        })
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts() {
        let start = tokio::time::Instant::now();
        let result: Result<(), _> =
            poll_until(4, Duration::from_millis(250), |_| async { None }).await;

        assert_eq!(result, Err(RetryExhausted { attempts: 4 }));
        // Three sleeps between four attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(750));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_probes_once() {
        let result = poll_until(0, Duration::from_secs(1), |_| async { Some("ok") }).await;
        assert_eq!(result, Ok("ok"));
    }
}
