use std::time::Duration;

/// Bounded-backoff retry policy for camera reconnection.
///
/// The monitoring core only consumes `FramePull`; reconnection lives out here
/// in the ingestion layer. A disconnect enters a retry state with doubling
/// delays up to a cap; a successful frame resets the policy. Exhausting the
/// attempt budget surfaces as an error to the daemon, never a panic.
#[derive(Debug)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next reconnect attempt, or `None` when the attempt
    /// budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let exp = self.attempts.min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    /// Called after a successful frame: the next disconnect starts fresh.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(30), 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap_then_exhausts() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(4), 4);

        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.attempts(), 4);
    }

    #[test]
    fn reset_restores_the_attempt_budget() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(4), 1);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }
}
