//! # Fibonacci Backoff
//!
//! Delay before the watch loop retries a failed reconciliation.
//!
//! Steps are counted in minutes and grow along the Fibonacci sequence up to
//! a ceiling: with a 1 minute floor and a 10 minute ceiling the retries wait
//! 1m, 1m, 2m, 3m, 5m, 8m, then 10m for every further failure.
//!
//! ```rust
//! use fastly_service_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci sequence of retry delays, in minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Sequence starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min_minutes = min_minutes.max(1);
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Current step in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self.current_minutes * 60;
        let next = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        seconds
    }

    /// Current step as a [`Duration`]; advances the sequence
    ///
    /// ```
    /// use fastly_service_controller::controller::backoff::FibonacciBackoff;
    /// use std::time::Duration;
    ///
    /// let mut backoff = FibonacciBackoff::new(2, 10);
    /// assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
    /// ```
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Back to the first step
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Consecutive failures of one service and the delay before the next attempt
#[derive(Debug, Clone)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying
    pub fn record_failure(&mut self) -> Duration {
        self.error_count += 1;
        self.backoff.next_backoff()
    }

    /// Record a success, clearing the failure streak
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}
