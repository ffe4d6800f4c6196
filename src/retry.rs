use std::future::Future;
use std::time::Duration;

/// Bounded retry for calls to upstream services.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(200) }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO }
    }

    /// Quadratic backoff: base, 4*base, 9*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_mul(attempt)
    }

    /// Runs `op` until it succeeds, fails with an error `is_transient`
    /// rejects, or `max_attempts` is reached. The last error is returned.
    pub async fn run<T, E, F, Fut, P>(&self, what: &str, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let backoff = self.delay_for(attempt);
                    metrics::increment_counter!("wanderlog_upstream_retries_total", "call" => what.to_string());
                    tracing::warn!(call = what, attempt, error = %e, ?backoff, "upstream call failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_quadratic() {
        let p = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(100) };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(400));
        assert_eq!(p.delay_for(3), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let out: Result<u32, String> = RetryPolicy::no_delay(3)
            .run(
                "test",
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 { Err(format!("boom {n}")) } else { Ok(n) }
                },
                |_| true,
            )
            .await;
        assert_eq!(out.unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), String> = RetryPolicy::no_delay(3)
            .run("test", move || async move { calls.fetch_add(1, Ordering::SeqCst); Err("down".to_string()) }, |_| true)
            .await;
        assert_eq!(out.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), String> = RetryPolicy::no_delay(3)
            .run("test", move || async move { calls.fetch_add(1, Ordering::SeqCst); Err("bad request".to_string()) }, |_| false)
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
