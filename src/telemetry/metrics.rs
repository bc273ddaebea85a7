//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Single attempt against the quote source
    Fetch,
    /// Whole scheduler tick, retries included
    Tick,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Quote fetched and validated
    FetchSuccess,
    /// Fetch failed after its last attempt
    FetchFailure,
    /// Attempt retried after a transient failure
    FetchRetry,
    /// Call refused by the local limiter
    RateLimited,
    /// Cache write rejected as older than the stored value
    StaleWrite,
    /// Cache entry evicted or swept
    CacheEviction,
    /// Alert fired
    AlertFired,
    /// Symbol paused after repeated failures
    SymbolPaused,
    /// In-flight result dropped because its symbol was removed
    DiscardedResult,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Symbols currently tracked
    TrackedSymbols,
    /// Entries held in the quote cache
    CacheEntries,
    /// Bytes held in the quote cache
    CacheBytes,
    /// Portfolio market value
    PortfolioValue,
    /// Alerts waiting to fire
    ActiveAlerts,
}

fn latency_name(metric: LatencyMetric) -> &'static str {
    match metric {
        LatencyMetric::Fetch => "quotesync_fetch_latency_ms",
        LatencyMetric::Tick => "quotesync_tick_latency_ms",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::FetchSuccess => "quotesync_fetch_success_total",
        CounterMetric::FetchFailure => "quotesync_fetch_failure_total",
        CounterMetric::FetchRetry => "quotesync_fetch_retry_total",
        CounterMetric::RateLimited => "quotesync_rate_limited_total",
        CounterMetric::StaleWrite => "quotesync_stale_write_total",
        CounterMetric::CacheEviction => "quotesync_cache_eviction_total",
        CounterMetric::AlertFired => "quotesync_alert_fired_total",
        CounterMetric::SymbolPaused => "quotesync_symbol_paused_total",
        CounterMetric::DiscardedResult => "quotesync_discarded_result_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::TrackedSymbols => "quotesync_tracked_symbols",
        GaugeMetric::CacheEntries => "quotesync_cache_entries",
        GaugeMetric::CacheBytes => "quotesync_cache_bytes",
        GaugeMetric::PortfolioValue => "quotesync_portfolio_value",
        GaugeMetric::ActiveAlerts => "quotesync_active_alerts",
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(latency_name(metric)).record(duration.as_secs_f64() * 1_000.0);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    increment_by(metric, 1);
}

pub fn increment_by(metric: CounterMetric, value: u64) {
    metrics::counter!(counter_name(metric)).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        assert!(latency_name(LatencyMetric::Fetch).starts_with("quotesync_"));
        assert!(counter_name(CounterMetric::AlertFired).ends_with("_total"));
        assert_eq!(gauge_name(GaugeMetric::CacheBytes), "quotesync_cache_bytes");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_latency(LatencyMetric::Tick, Duration::from_millis(12));
        increment(CounterMetric::FetchSuccess);
        set_gauge(GaugeMetric::TrackedSymbols, 3.0);
    }
}
