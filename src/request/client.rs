//! Retrying, rate-limited quote fetcher

use super::SlidingWindowLimiter;
use crate::config::{RequestConfig, ValidationConfig};
use crate::quote::{validate_snapshot, FetchError, MarketDataSource, Snapshot};
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Instant};

/// Wraps a [`MarketDataSource`] with timeouts, linear retries, validation
/// and a shared sliding-window limiter.
pub struct RequestClient<S> {
    source: S,
    config: RequestConfig,
    validation: ValidationConfig,
    limiter: Arc<SlidingWindowLimiter>,
}

impl<S: MarketDataSource> RequestClient<S> {
    /// Create a client with its own limiter
    pub fn new(source: S, config: RequestConfig, validation: ValidationConfig) -> Self {
        let limiter = Arc::new(SlidingWindowLimiter::per_minute(
            config.max_requests_per_minute,
        ));
        Self {
            source,
            config,
            validation,
            limiter,
        }
    }

    /// Share a limiter with other clients
    pub fn with_limiter(mut self, limiter: Arc<SlidingWindowLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Fetch and validate a quote
    ///
    /// Network, HTTP and timeout failures are retried up to `retry_attempts`
    /// total attempts, waiting `retry_delay * n` after the n-th failure.
    /// Parse and validation failures return at once. When the limiter is
    /// full the call fails with `RateLimited` without using an attempt.
    pub async fn fetch(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let max_attempts = self.config.retry_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            if !self.limiter.try_acquire() {
                increment(CounterMetric::RateLimited);
                tracing::debug!(symbol, attempt, "Request refused by rate limiter");
                return Err(FetchError::RateLimited {
                    limit: self.limiter.limit(),
                });
            }

            let result = self.attempt(symbol).await;

            match result {
                Ok(snapshot) => {
                    increment(CounterMetric::FetchSuccess);
                    return Ok(snapshot);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry_delay() * attempt;
                    increment(CounterMetric::FetchRetry);
                    tracing::warn!(
                        symbol,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Quote fetch failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    increment(CounterMetric::FetchFailure);
                    tracing::debug!(symbol, attempt, kind = e.kind(), error = %e, "Quote fetch failed");
                    return Err(e);
                }
            }
        }
    }

    /// One timed, validated call to the source
    async fn attempt(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let limit = self.config.request_timeout();
        let started = Instant::now();

        let result = match timeout(limit, self.source.fetch_quote(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(limit)),
        };
        record_latency(LatencyMetric::Fetch, started.elapsed());

        let snapshot = result?;
        if !snapshot.symbol.eq_ignore_ascii_case(symbol) {
            return Err(FetchError::Validation(format!(
                "requested {} but received {}",
                symbol, snapshot.symbol
            )));
        }
        validate_snapshot(&snapshot, &self.validation)?;
        Ok(snapshot)
    }
}
