//! Fibonacci backoff for requeued keys.
//!
//! Delays follow min, min, 2*min, 3*min, 5*min, ... capped at max. The work
//! queue keeps a failure count per key and asks for the delay matching it.

use std::time::Duration;

/// Fibonacci backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min: Duration,
    max: Duration,
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl FibonacciBackoff {
    /// Create a backoff between `min` and `max`. `max` is raised to `min`
    /// if it is smaller.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max: max.max(min) }
    }

    /// Delay for the `failures`-th consecutive failure (1-based; 0 is treated as 1).
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures <= 2 {
            return self.min;
        }

        // F(n) = F(n-1) + F(n-2), starting with prev = min, current = min
        let mut prev = self.min;
        let mut current = self.min;
        for _ in 3..=failures {
            let next = prev.saturating_add(current);
            prev = current;
            current = next.min(self.max);

            // If we've hit the max, we can stop early
            if current >= self.max {
                break;
            }
        }
        current
    }
}
