//! Sliding-window request limiter
//!
//! Keeps the instants of accepted calls inside the window and refuses a new
//! call once the window is full. Refusal is immediate: callers never wait.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Global cap on calls per rolling window
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    /// Maximum calls inside one window (0 = unlimited)
    max_requests: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Limiter over a one-minute window
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Record a call if the window has room
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune(&mut calls, now, self.window);

        if calls.len() >= self.max_requests as usize {
            return false;
        }
        calls.push_back(now);
        true
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = calls.front() {
            if now.duration_since(*oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}
