//! Fixed-window rate limiter keyed by (operation, owner).
//!
//! Each key gets a counter and a reset instant. The first request opens a
//! window; once `max_requests` have been admitted, further requests are
//! rejected with the time left until the window resets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitTable;

use super::Operation;

struct Window {
    count: u32,
    resets_at: Instant,
}

pub struct RateLimiter {
    limits: RateLimitTable,
    windows: Mutex<HashMap<(Operation, String), Window>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("active_windows", &self.active_windows())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(limits: RateLimitTable) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit one request, or return how long until the window resets.
    pub fn check(&self, operation: Operation, owner: &str) -> Result<(), Duration> {
        self.check_at(operation, owner, Instant::now())
    }

    pub(crate) fn check_at(
        &self,
        operation: Operation,
        owner: &str,
        now: Instant,
    ) -> Result<(), Duration> {
        let limit = self.limits.limit_for(operation);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let key = (operation, owner.to_string());
        if windows.get(&key).is_some_and(|w| w.resets_at <= now) {
            windows.remove(&key);
        }

        if let Some(window) = windows.get_mut(&key) {
            if window.count >= limit.max_requests {
                let retry_after = window.resets_at.saturating_duration_since(now);
                log::warn!(
                    "[cardflow.ratelimit] {} exceeded for {} (max {} per {}ms)",
                    operation,
                    owner,
                    limit.max_requests,
                    limit.window_ms
                );
                return Err(retry_after);
            }
            window.count += 1;
            return Ok(());
        }

        // Drop expired windows before opening a new one.
        windows.retain(|_, w| w.resets_at > now);
        if limit.max_requests == 0 {
            return Err(limit.window());
        }
        windows.insert(
            key,
            Window {
                count: 1,
                resets_at: now + limit.window(),
            },
        );
        Ok(())
    }

    pub fn active_windows(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
