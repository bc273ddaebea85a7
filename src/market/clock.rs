//! Trading session clock

use super::{MarketSession, MarketStatus, SessionProvider};
use crate::config::{DstRule, MarketClockConfig};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};

/// Pure mapping from an instant to the exchange's trading session
#[derive(Debug, Clone)]
pub struct MarketClock {
    config: MarketClockConfig,
}

impl MarketClock {
    /// Create a clock for the given exchange calendar
    pub fn new(config: MarketClockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarketClockConfig {
        &self.config
    }

    /// Exchange-local wall time for a UTC instant
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        let standard =
            now.naive_utc() + Duration::minutes(i64::from(self.config.utc_offset_minutes));
        if self.is_daylight_saving(standard) {
            standard + Duration::hours(1)
        } else {
            standard
        }
    }

    /// Session at `now`
    ///
    /// Precedence: holiday, then non-trading weekday, then the time-of-day
    /// windows. Windows are half-open: `[open, close)`.
    pub fn session_at(&self, now: DateTime<Utc>) -> MarketSession {
        let local = self.local_time(now);
        let date = local.date();

        if self.config.holidays.contains(&date) {
            return MarketSession::Holiday;
        }
        if !self.config.trading_days.contains(&date.weekday()) {
            return MarketSession::Weekend;
        }

        let t = local.time();
        let cfg = &self.config;
        if t >= cfg.market_open && t < cfg.market_close {
            MarketSession::Open
        } else if t >= cfg.pre_market_open && t < cfg.market_open {
            MarketSession::PreMarket
        } else if t >= cfg.market_close && t < cfg.after_hours_close {
            MarketSession::AfterHours
        } else {
            MarketSession::Closed
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> MarketStatus {
        MarketStatus {
            session: self.session_at(now),
            evaluated_at: now,
        }
    }

    pub fn status(&self) -> MarketStatus {
        self.status_at(Utc::now())
    }

    /// Whether a local standard-time instant falls inside daylight saving
    fn is_daylight_saving(&self, standard: NaiveDateTime) -> bool {
        match self.config.dst {
            DstRule::None => false,
            DstRule::Us => {
                let year = standard.year();
                // 02:00 standard on the second Sunday of March
                let start = nth_sunday(year, 3, 2).and_then(|d| d.and_hms_opt(2, 0, 0));
                // 02:00 daylight (01:00 standard) on the first Sunday of November
                let end = nth_sunday(year, 11, 1).and_then(|d| d.and_hms_opt(1, 0, 0));
                match (start, end) {
                    (Some(start), Some(end)) => standard >= start && standard < end,
                    _ => false,
                }
            }
        }
    }
}

fn nth_sunday(year: i32, month: u32, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, n)
}

impl SessionProvider for MarketClock {
    fn current_session(&self) -> MarketSession {
        self.session_at(Utc::now())
    }
}
