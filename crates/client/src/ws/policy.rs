//! Reconnect backoff policy.

use std::time::Duration;

/// What to do after an unplanned close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry as attempt number `attempt` once `delay` has elapsed.
    Retry { attempt: u32, delay: Duration },
    /// The ceiling is exhausted; stop until the caller reconnects manually.
    GiveUp { attempts: u32 },
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries allowed per connection before giving up (0 = never retry)
    pub max_attempts: u32,
    /// Base of the exponential backoff
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt`: `base * 2^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide the next step given how many retries already happened.
    ///
    /// The counter is bumped before the delay is computed, so the first
    /// retry waits `base * 2`.
    pub fn next(&self, attempts_so_far: u32) -> Backoff {
        if attempts_so_far >= self.max_attempts {
            return Backoff::GiveUp {
                attempts: attempts_so_far,
            };
        }
        let attempt = attempts_so_far + 1;
        Backoff::Retry {
            attempt,
            delay: self.delay_for_attempt(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(32));
    }

    #[test]
    fn delay_is_capped() {
        let policy = ReconnectPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(10));
    }

    #[test]
    fn first_retry_waits_twice_the_base() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(
            policy.next(0),
            Backoff::Retry {
                attempt: 1,
                delay: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn attempts_increase_until_ceiling_then_give_up() {
        let policy = ReconnectPolicy::default();
        let mut attempts = 0;
        let mut delays = Vec::new();
        loop {
            match policy.next(attempts) {
                Backoff::Retry { attempt, delay } => {
                    assert_eq!(attempt, attempts + 1);
                    attempts = attempt;
                    delays.push(delay.as_secs());
                }
                Backoff::GiveUp { attempts: n } => {
                    assert_eq!(n, 5);
                    break;
                }
            }
        }
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
        assert_eq!(policy.next(5), Backoff::GiveUp { attempts: 5 });
        assert_eq!(policy.next(9), Backoff::GiveUp { attempts: 9 });
    }

    #[test]
    fn zero_ceiling_never_retries() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(policy.next(0), Backoff::GiveUp { attempts: 0 });
    }
}
