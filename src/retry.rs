//! # retry — Bounded retry with linear, class-dependent backoff
//!
//! One policy type shared by page scraping, price lookups and sheet writes.
//! The wait before attempt `n + 1` is `step(class) × n`, where the step is
//! picked from the failing error's [`ErrorClass`]. Nothing retries forever:
//! once `max_attempts` is reached the last error is handed back so the caller
//! can degrade to its smaller-granularity fallback.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ErrorClass, SyncError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts:    u32,
    pub rate_limit_step: Duration,
    pub transient_step:  Duration,
    pub other_step:      Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, rate_limit_step: Duration, transient_step: Duration, other_step: Duration) -> Self {
        Self { max_attempts, rate_limit_step, transient_step, other_step }
    }

    /// Spreadsheet writes: 30s / 5s / 3s steps.
    pub fn sheet_write(max_attempts: u32) -> Self {
        Self::new(max_attempts, secs(30), secs(5), secs(3))
    }

    /// Combined price request: 30s on 429, 10s on network trouble, 5s otherwise.
    pub fn price_batch(max_attempts: u32) -> Self {
        Self::new(max_attempts, secs(30), secs(10), secs(5))
    }

    /// Single-symbol price request: 30/60/90s on 429, 5/10/15s on network errors.
    pub fn price_single(max_attempts: u32) -> Self {
        Self::new(max_attempts, secs(30), secs(5), secs(3))
    }

    /// Explorer page fetch. A 429 from an explorer is treated like any other
    /// network hiccup.
    pub fn scrape(max_attempts: u32) -> Self {
        Self::new(max_attempts, secs(5), secs(5), secs(3))
    }

    pub fn delay_for(&self, class: ErrorClass, attempt: u32) -> Duration {
        let step = match class {
            ErrorClass::RateLimit => self.rate_limit_step,
            ErrorClass::Transient => self.transient_step,
            ErrorClass::Other     => self.other_step,
        };
        step * attempt
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Re-submitting must be safe:
    /// every call site in this crate is idempotent (GETs and cell overwrites).
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => {
                    warn!(what, attempts = attempt, error = %e, "❌ Retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let class = e.class();
                    let wait = self.delay_for(class, attempt);
                    warn!(
                        what,
                        attempt,
                        max_attempts,
                        class    = ?class,
                        wait_secs = wait.as_secs_f64(),
                        error    = %e,
                        "Attempt failed — backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_delay_is_linear_in_attempt() {
        let policy = RetryPolicy::sheet_write(3);
        assert_eq!(policy.delay_for(ErrorClass::RateLimit, 1), secs(30));
        assert_eq!(policy.delay_for(ErrorClass::RateLimit, 3), secs(90));
        assert_eq!(policy.delay_for(ErrorClass::Transient, 2), secs(10));
        assert_eq!(policy.delay_for(ErrorClass::Other, 2), secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt() {
        let policy = RetryPolicy::sheet_write(3);
        let start = Instant::now();
        let mut calls = 0u32;

        let result = policy
            .run("test", |_| {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(SyncError::RateLimited("quota".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
        // 30s after the first failure, 60s after the second
        assert_eq!(start.elapsed().as_secs(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_without_trailing_sleep() {
        let policy = RetryPolicy::scrape(2);
        let start = Instant::now();
        let mut calls = 0u32;

        let result: Result<(), _> = policy
            .run("test", |_| {
                calls += 1;
                async { Err(SyncError::Network("refused".into())) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Network(_))));
        assert_eq!(calls, 2);
        assert_eq!(start.elapsed().as_secs(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_tries_once() {
        let policy = RetryPolicy::price_single(0);
        let mut calls = 0u32;
        let result = policy
            .run("test", |attempt| {
                calls += 1;
                async move { Ok::<_, SyncError>(attempt) }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls, 1);
    }
}
