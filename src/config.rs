//! Configuration types for quote-sync

use chrono::{NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub market: MarketClockConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Upstream quote provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Transport-level timeout, independent of the per-attempt request timeout
    #[serde(default = "default_source_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_source_timeout_ms() -> u64 {
    10_000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_key: None,
            timeout_ms: default_source_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Polling scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Polling interval while the market is open
    #[serde(default = "default_market_hours_interval_ms")]
    pub market_hours_interval_ms: u64,

    /// Polling interval in every other session
    #[serde(default = "default_after_hours_interval_ms")]
    pub after_hours_interval_ms: u64,

    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Interval growth factor applied after each failed tick
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Consecutive tick failures before a symbol is paused
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_true")]
    pub auto_pause_on_error: bool,

    #[serde(default = "default_auto_resume_delay_ms")]
    pub auto_resume_delay_ms: u64,

    /// Suspend ticks while the host is hidden
    #[serde(default = "default_true")]
    pub pause_when_hidden: bool,

    /// Resume suspended ticks as soon as the host is visible again
    #[serde(default = "default_true")]
    pub resume_on_visible: bool,

    /// How often expired cache entries are swept
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Capacity of the command channel feeding the scheduler
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_true() -> bool {
    true
}
fn default_market_hours_interval_ms() -> u64 {
    15_000
}
fn default_after_hours_interval_ms() -> u64 {
    60_000
}
fn default_min_interval_ms() -> u64 {
    5_000
}
fn default_max_interval_ms() -> u64 {
    300_000 // 5 minutes
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_auto_resume_delay_ms() -> u64 {
    300_000
}
fn default_sweep_interval_ms() -> u64 {
    60_000
}
fn default_command_buffer() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            market_hours_interval_ms: default_market_hours_interval_ms(),
            after_hours_interval_ms: default_after_hours_interval_ms(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_retries: default_max_retries(),
            auto_pause_on_error: true,
            auto_resume_delay_ms: default_auto_resume_delay_ms(),
            pause_when_hidden: true,
            resume_on_visible: true,
            sweep_interval_ms: default_sweep_interval_ms(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl SchedulerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.min_interval_ms))
    }

    pub fn auto_resume_delay(&self) -> Duration {
        Duration::from_millis(self.auto_resume_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Expiring cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Upper bound on the summed size of all entries, in bytes
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,

    #[serde(default = "default_quote_ttl_ms")]
    pub quote_ttl_ms: u64,

    #[serde(default = "default_historical_ttl_ms")]
    pub historical_ttl_ms: u64,

    #[serde(default = "default_meta_ttl_ms")]
    pub meta_ttl_ms: u64,
}

fn default_max_entries() -> usize {
    500
}
fn default_max_size_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_quote_ttl_ms() -> u64 {
    60_000
}
fn default_historical_ttl_ms() -> u64 {
    3_600_000 // 1 hour
}
fn default_meta_ttl_ms() -> u64 {
    86_400_000 // 1 day
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_size_bytes: default_max_size_bytes(),
            quote_ttl_ms: default_quote_ttl_ms(),
            historical_ttl_ms: default_historical_ttl_ms(),
            meta_ttl_ms: default_meta_ttl_ms(),
        }
    }
}

/// Retry and rate-limit configuration for the request layer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestConfig {
    /// Total attempts per fetch, including the first one
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry delay; attempt n waits `retry_delay_ms * (n - 1)`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
}

fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_requests_per_minute() -> u32 {
    60
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_requests_per_minute: default_max_requests_per_minute(),
        }
    }
}

impl RequestConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Numeric sanity bounds applied to every fetched snapshot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,

    #[serde(default = "default_max_price")]
    pub max_price: Decimal,

    /// Largest believable move from previous close, in percent
    #[serde(default = "default_max_change_pct")]
    pub max_change_pct: Decimal,
}

fn default_min_price() -> Decimal {
    Decimal::new(1, 4) // 0.0001
}
fn default_max_price() -> Decimal {
    Decimal::new(10_000_000, 0)
}
fn default_max_change_pct() -> Decimal {
    Decimal::new(50, 0)
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_price: default_min_price(),
            max_price: default_max_price(),
            max_change_pct: default_max_change_pct(),
        }
    }
}

/// Daylight saving rule applied on top of the fixed UTC offset
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DstRule {
    /// No daylight saving adjustment
    #[default]
    None,
    /// Second Sunday of March to first Sunday of November, 02:00 local
    Us,
}

/// Trading calendar and session boundaries
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketClockConfig {
    /// Standard-time offset from UTC in minutes (e.g. -300 for New York)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_dst_rule")]
    pub dst: DstRule,

    #[serde(default = "default_pre_market_open")]
    pub pre_market_open: NaiveTime,

    #[serde(default = "default_market_open")]
    pub market_open: NaiveTime,

    #[serde(default = "default_market_close")]
    pub market_close: NaiveTime,

    #[serde(default = "default_after_hours_close")]
    pub after_hours_close: NaiveTime,

    #[serde(default = "default_trading_days")]
    pub trading_days: Vec<Weekday>,

    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

fn default_utc_offset_minutes() -> i32 {
    -300
}
fn default_dst_rule() -> DstRule {
    DstRule::Us
}
fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}
fn default_pre_market_open() -> NaiveTime {
    hms(4, 0)
}
fn default_market_open() -> NaiveTime {
    hms(9, 30)
}
fn default_market_close() -> NaiveTime {
    hms(16, 0)
}
fn default_after_hours_close() -> NaiveTime {
    hms(20, 0)
}
fn default_trading_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

impl Default for MarketClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            dst: default_dst_rule(),
            pre_market_open: default_pre_market_open(),
            market_open: default_market_open(),
            market_close: default_market_close(),
            after_hours_close: default_after_hours_close(),
            trading_days: default_trading_days(),
            holidays: Vec::new(),
        }
    }
}

/// Key-value persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON file backing the store; in-memory only when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Prefix applied to every persisted key
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
}

fn default_store_prefix() -> String {
    "quote-sync:".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            prefix: default_store_prefix(),
        }
    }
}

/// Symbols tracked at startup and their held quantities
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchlistConfig {
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Quantity held per symbol; unlisted symbols count as one unit
    #[serde(default)]
    pub holdings: HashMap<String, Decimal>,
}

/// Log output format selector
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; exporter disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormatConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormatConfig::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
